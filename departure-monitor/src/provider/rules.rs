//! Per-provider interpretation of stop events.
//!
//! The normalized [`StopEvent`] shape is shared, but each network fills it
//! differently: the platform lives in different fields, product classes mean
//! different things, and "realtime" is signalled in three different ways.

use crate::domain::{ProviderId, TransportType};

use super::types::StopEvent;

/// How to read transport type, platform and realtime state from an event.
pub trait EventRules {
    fn transport_type(&self, event: &StopEvent) -> TransportType;

    /// Platform or track, empty when unknown.
    fn platform(&self, event: &StopEvent) -> String;

    fn is_realtime(&self, event: &StopEvent) -> bool;
}

impl EventRules for ProviderId {
    fn transport_type(&self, event: &StopEvent) -> TransportType {
        match self {
            // EFA networks treat a missing class as class 0
            ProviderId::Vrr => TransportType::from_vrr_class(event.product_class().unwrap_or(0)),
            ProviderId::Kvv => TransportType::from_kvv_class(event.product_class().unwrap_or(0)),
            ProviderId::Hvv => TransportType::from_hvv_class(event.product_class().unwrap_or(0)),
            ProviderId::TrafiklabSe => {
                TransportType::from_trafiklab_mode(event.transport_mode.as_deref().unwrap_or("BUS"))
            }
            ProviderId::NtaIe | ProviderId::GtfsDe => {
                TransportType::from_gtfs_route_type(event.product_class().unwrap_or(3))
            }
        }
    }

    fn platform(&self, event: &StopEvent) -> String {
        let location = event.location.as_ref();
        let found = match self {
            ProviderId::Vrr => event
                .platform_object_name()
                .or_else(|| non_empty(event.platform_name.as_deref())),
            ProviderId::Kvv => location
                .and_then(|l| non_empty(l.disassembled_name.as_deref()))
                .or_else(|| non_empty(event.platform_name.as_deref())),
            ProviderId::Hvv => location
                .and_then(|l| l.properties.as_ref())
                .and_then(|p| non_empty(p.platform.as_deref()))
                .or_else(|| location.and_then(|l| non_empty(l.platform_name.as_deref()))),
            ProviderId::TrafiklabSe | ProviderId::NtaIe | ProviderId::GtfsDe => {
                event.platform_object_name()
            }
        };
        found.unwrap_or_default().to_string()
    }

    fn is_realtime(&self, event: &StopEvent) -> bool {
        match self {
            ProviderId::Vrr | ProviderId::NtaIe | ProviderId::GtfsDe => event.is_monitored(),
            ProviderId::Kvv => event.is_realtime_controlled.unwrap_or(false),
            ProviderId::Hvv | ProviderId::TrafiklabSe => {
                match (
                    non_empty(event.departure_time_estimated.as_deref()),
                    non_empty(event.departure_time_planned.as_deref()),
                ) {
                    (Some(estimated), Some(planned)) => estimated != planned,
                    _ => false,
                }
            }
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::{
        EventLocation, LocationProperties, Platform, Product, Transportation,
    };

    fn with_class(class: i64) -> StopEvent {
        StopEvent {
            transportation: Some(Transportation {
                product: Some(Product {
                    class: Some(class),
                    name: None,
                }),
                ..Transportation::default()
            }),
            ..StopEvent::default()
        }
    }

    #[test]
    fn efa_class_tables_differ_per_network() {
        let event = with_class(10);
        assert_eq!(ProviderId::Vrr.transport_type(&event), TransportType::Taxi);
        assert_eq!(ProviderId::Hvv.transport_type(&event), TransportType::OnDemand);
        assert_eq!(ProviderId::Kvv.transport_type(&event), TransportType::Unknown);
    }

    #[test]
    fn missing_class_defaults() {
        let event = StopEvent::default();
        assert_eq!(ProviderId::Vrr.transport_type(&event), TransportType::Train);
        assert_eq!(ProviderId::GtfsDe.transport_type(&event), TransportType::Bus);
        assert_eq!(ProviderId::TrafiklabSe.transport_type(&event), TransportType::Bus);
    }

    #[test]
    fn trafiklab_uses_transport_mode() {
        let event = StopEvent {
            transport_mode: Some("METRO".into()),
            ..with_class(0)
        };
        assert_eq!(
            ProviderId::TrafiklabSe.transport_type(&event),
            TransportType::Subway
        );
    }

    #[test]
    fn vrr_platform_fallback() {
        let event = StopEvent {
            platform: Some(Platform::named("")),
            platform_name: Some("Gleis 3".into()),
            ..StopEvent::default()
        };
        assert_eq!(ProviderId::Vrr.platform(&event), "Gleis 3");

        let event = StopEvent {
            platform: Some(Platform::named("1")),
            platform_name: Some("Gleis 3".into()),
            ..StopEvent::default()
        };
        assert_eq!(ProviderId::Vrr.platform(&event), "1");
    }

    #[test]
    fn kvv_platform_from_location() {
        let event = StopEvent {
            location: Some(EventLocation {
                disassembled_name: Some("Gleis 2".into()),
                ..EventLocation::default()
            }),
            platform_name: Some("2".into()),
            ..StopEvent::default()
        };
        assert_eq!(ProviderId::Kvv.platform(&event), "Gleis 2");
    }

    #[test]
    fn hvv_platform_from_properties() {
        let mut event = StopEvent {
            location: Some(EventLocation {
                platform_name: Some("Bstg. 1".into()),
                properties: Some(LocationProperties {
                    platform: Some("3".into()),
                }),
                ..EventLocation::default()
            }),
            ..StopEvent::default()
        };
        assert_eq!(ProviderId::Hvv.platform(&event), "3");

        event.location.as_mut().unwrap().properties = None;
        assert_eq!(ProviderId::Hvv.platform(&event), "Bstg. 1");
    }

    #[test]
    fn missing_platform_is_empty() {
        for id in ProviderId::ALL {
            assert_eq!(id.platform(&StopEvent::default()), "");
        }
    }

    #[test]
    fn realtime_signals() {
        let monitored = StopEvent {
            realtime_status: vec!["MONITORED".into()],
            ..StopEvent::default()
        };
        assert!(ProviderId::Vrr.is_realtime(&monitored));
        assert!(ProviderId::NtaIe.is_realtime(&monitored));
        assert!(!ProviderId::Kvv.is_realtime(&monitored));

        let controlled = StopEvent {
            is_realtime_controlled: Some(true),
            ..StopEvent::default()
        };
        assert!(ProviderId::Kvv.is_realtime(&controlled));

        let shifted = StopEvent {
            departure_time_planned: Some("2025-01-15T10:00:00".into()),
            departure_time_estimated: Some("2025-01-15T10:02:00".into()),
            ..StopEvent::default()
        };
        assert!(ProviderId::Hvv.is_realtime(&shifted));
        assert!(ProviderId::TrafiklabSe.is_realtime(&shifted));

        let same = StopEvent {
            departure_time_estimated: shifted.departure_time_planned.clone(),
            ..shifted
        };
        assert!(!ProviderId::TrafiklabSe.is_realtime(&same));
    }
}
