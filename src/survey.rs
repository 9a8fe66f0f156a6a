use serde::{Deserialize, Serialize};

/// One survey round: `group.name.community` is the stable field value
/// stamped onto each household structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SurveySchedule {
    pub group_name: String,
    pub name: String,
    pub community: String,
}

impl SurveySchedule {
    pub fn field_value(&self) -> String {
        format!("{}.{}.{}", self.group_name, self.name, self.community)
    }

    pub fn short_name(&self) -> String {
        format!("{}.{}", self.group_name, self.name)
    }
}

/// Ordered schedule configuration for the active survey group. Every
/// household gets one structure per schedule listed here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SurveySchedules {
    pub group_name: String,
    schedules: Vec<SurveySchedule>,
}

impl SurveySchedules {
    pub fn new(group_name: impl Into<String>, schedules: Vec<SurveySchedule>) -> Self {
        Self {
            group_name: group_name.into(),
            schedules,
        }
    }

    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn schedules(&self) -> &[SurveySchedule] {
        &self.schedules
    }

    pub fn field_values(&self) -> Vec<String> {
        self.schedules.iter().map(|s| s.field_value()).collect()
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}
