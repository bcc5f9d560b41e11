//! ---
//! halow_section: "02-messaging"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Delivery guarantees mapped onto MQTT quality of service."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use rumqttc::QoS;

use crate::{MessagingError, Result};

/// Delivery guarantees supported by the publish channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryGuarantee {
    /// Fire and forget; complete once the packet leaves the client.
    AtMostOnce,
    /// Complete once the broker returns `PUBACK`.
    #[default]
    AtLeastOnce,
    /// Complete once the broker finishes the `PUBREC`/`PUBCOMP` exchange.
    ExactlyOnce,
}

impl DeliveryGuarantee {
    /// Map a numeric MQTT level (as found in configuration) to a guarantee.
    pub fn from_level(level: u8) -> Result<Self> {
        match level {
            0 => Ok(DeliveryGuarantee::AtMostOnce),
            1 => Ok(DeliveryGuarantee::AtLeastOnce),
            2 => Ok(DeliveryGuarantee::ExactlyOnce),
            other => Err(MessagingError::InvalidQos(other)),
        }
    }

    /// Whether the publish completes only after a broker acknowledgement.
    pub fn awaits_ack(&self) -> bool {
        !matches!(self, DeliveryGuarantee::AtMostOnce)
    }

    pub(crate) fn as_qos(&self) -> QoS {
        match self {
            DeliveryGuarantee::AtMostOnce => QoS::AtMostOnce,
            DeliveryGuarantee::AtLeastOnce => QoS::AtLeastOnce,
            DeliveryGuarantee::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_levels_map_to_guarantees() {
        assert_eq!(
            DeliveryGuarantee::from_level(0).unwrap(),
            DeliveryGuarantee::AtMostOnce
        );
        assert_eq!(
            DeliveryGuarantee::from_level(2).unwrap().as_qos(),
            QoS::ExactlyOnce
        );
        assert!(DeliveryGuarantee::AtLeastOnce.awaits_ack());
        assert!(!DeliveryGuarantee::AtMostOnce.awaits_ack());
    }

    #[test]
    fn out_of_range_level_rejected() {
        assert!(matches!(
            DeliveryGuarantee::from_level(3),
            Err(MessagingError::InvalidQos(3))
        ));
    }
}
