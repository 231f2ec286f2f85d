use serde::Deserialize;
use time::{Date, Time};

#[derive(Debug, Deserialize)]
pub struct CreateSlotRequest {
    pub date: Date,
    pub start_time: Time,
    pub end_time: Time,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, time};

    #[test]
    fn create_slot_request_roundtrip() {
        let value = serde_json::json!({
            "date": date!(2025 - 01 - 01),
            "start_time": time!(09:00),
            "end_time": time!(10:00),
        });
        let req: CreateSlotRequest = serde_json::from_value(value).unwrap();
        assert_eq!(req.date, date!(2025 - 01 - 01));
        assert_eq!(req.start_time, time!(09:00));
        assert_eq!(req.end_time, time!(10:00));
    }
}
