use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub slot_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReservationRequest {
    pub new_slot_id: i64,
}
