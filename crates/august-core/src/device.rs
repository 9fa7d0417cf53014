// Unified view over the two tracked device kinds.

use august_api::model::{Doorbell, DoorbellDetail, Lock, LockDetail};

/// A tracked device as known from discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Device {
    Lock(Lock),
    Doorbell(Doorbell),
}

impl Device {
    pub fn device_id(&self) -> &str {
        match self {
            Self::Lock(lock) => &lock.device_id,
            Self::Doorbell(doorbell) => &doorbell.device_id,
        }
    }

    pub fn device_name(&self) -> &str {
        match self {
            Self::Lock(lock) => &lock.device_name,
            Self::Doorbell(doorbell) => &doorbell.device_name,
        }
    }

    pub fn house_id(&self) -> &str {
        match self {
            Self::Lock(lock) => &lock.house_id,
            Self::Doorbell(doorbell) => &doorbell.house_id,
        }
    }

    pub fn is_lock(&self) -> bool {
        matches!(self, Self::Lock(_))
    }
}

/// A cached state snapshot for a tracked device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceDetail {
    Lock(LockDetail),
    Doorbell(DoorbellDetail),
}

impl DeviceDetail {
    pub fn device_id(&self) -> &str {
        match self {
            Self::Lock(detail) => &detail.device_id,
            Self::Doorbell(detail) => &detail.device_id,
        }
    }

    /// The lock snapshot, if this device is a lock.
    pub fn as_lock(&self) -> Option<&LockDetail> {
        match self {
            Self::Lock(detail) => Some(detail),
            Self::Doorbell(_) => None,
        }
    }

    /// The doorbell snapshot, if this device is a doorbell.
    pub fn as_doorbell(&self) -> Option<&DoorbellDetail> {
        match self {
            Self::Lock(_) => None,
            Self::Doorbell(detail) => Some(detail),
        }
    }
}
