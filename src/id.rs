use uuid::Uuid;

/// UUIDv7 string ids: timestamp-sortable, so id order is insertion order.
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_sort_by_creation() {
        let a = new_uuid_v7();
        let b = new_uuid_v7();
        assert!(a < b);
    }
}
