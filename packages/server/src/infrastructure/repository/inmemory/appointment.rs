//! InMemory Appointment Directory 実装
//!
//! 起動時に与えられた予約だけを知っている Directory。

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{Appointment, AppointmentDirectory, RoomId, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryAppointmentDirectory {
    appointments: HashMap<RoomId, Appointment>,
}

impl InMemoryAppointmentDirectory {
    pub fn new(appointments: impl IntoIterator<Item = Appointment>) -> Self {
        Self {
            appointments: appointments
                .into_iter()
                .map(|appointment| (appointment.id.clone(), appointment))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.appointments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }
}

#[async_trait]
impl AppointmentDirectory for InMemoryAppointmentDirectory {
    async fn find_appointment(&self, room_id: &RoomId) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.get(room_id).cloned())
    }
}
