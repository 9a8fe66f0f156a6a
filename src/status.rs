use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef},
    Sqlite,
};

/// Outcome of one enumeration visit, as reported at the door.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HouseholdStatus {
    NoHouseholdInformant,
    EligibleRepresentativeAbsent,
    EligibleRepresentativePresent,
    RefusedEnumeration,
}

impl HouseholdStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HouseholdStatus::NoHouseholdInformant => "no_household_informant",
            HouseholdStatus::EligibleRepresentativeAbsent => "eligible_representative_absent",
            HouseholdStatus::EligibleRepresentativePresent => "eligible_representative_present",
            HouseholdStatus::RefusedEnumeration => "refused_enumeration",
        }
    }

    /// An attempt that yielded no usable informant data.
    pub fn is_failed_attempt(&self) -> bool {
        matches!(
            self,
            HouseholdStatus::NoHouseholdInformant
                | HouseholdStatus::EligibleRepresentativeAbsent
                | HouseholdStatus::RefusedEnumeration
        )
    }

    /// Enumeration actually happened with a representative present.
    pub fn is_enumerated(&self) -> bool {
        matches!(self, HouseholdStatus::EligibleRepresentativePresent)
    }
}

impl fmt::Display for HouseholdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HouseholdStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "no_household_informant" => Ok(HouseholdStatus::NoHouseholdInformant),
            "eligible_representative_absent" => Ok(HouseholdStatus::EligibleRepresentativeAbsent),
            "eligible_representative_present" => Ok(HouseholdStatus::EligibleRepresentativePresent),
            "refused_enumeration" => Ok(HouseholdStatus::RefusedEnumeration),
            other => Err(format!("invalid household status: {other}")),
        }
    }
}

impl sqlx::Type<Sqlite> for HouseholdStatus {
    fn type_info() -> SqliteTypeInfo {
        <&str as sqlx::Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <&str as sqlx::Type<Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, Sqlite> for HouseholdStatus {
    fn encode_by_ref(&self, buf: &mut Vec<SqliteArgumentValue<'q>>) -> Result<IsNull, BoxDynError> {
        <&str as sqlx::Encode<'q, Sqlite>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, Sqlite> for HouseholdStatus {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <&str as sqlx::Decode<'r, Sqlite>>::decode(value)?;
        raw.parse().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_set_matches_contract() {
        assert!(HouseholdStatus::NoHouseholdInformant.is_failed_attempt());
        assert!(HouseholdStatus::EligibleRepresentativeAbsent.is_failed_attempt());
        assert!(HouseholdStatus::RefusedEnumeration.is_failed_attempt());
        assert!(!HouseholdStatus::EligibleRepresentativePresent.is_failed_attempt());
    }

    #[test]
    fn round_trips_through_str() {
        for status in [
            HouseholdStatus::NoHouseholdInformant,
            HouseholdStatus::EligibleRepresentativeAbsent,
            HouseholdStatus::EligibleRepresentativePresent,
            HouseholdStatus::RefusedEnumeration,
        ] {
            assert_eq!(status.as_str().parse::<HouseholdStatus>(), Ok(status));
        }
    }
}
