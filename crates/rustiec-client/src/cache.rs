use crate::value::{PointValue, Sample};
use rustiec_core::asdu::Asdu;
use rustiec_core::types::{Quality, TypeId};
use dashmap::DashMap;
use std::time::Instant;

/// Latest sample per IOA for one device.
///
/// Written by the session's driver task, read by any number of callers.
#[derive(Debug, Default)]
pub struct PointCache {
    points: DashMap<u32, Sample>,
}

impl PointCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores every process value carried by a monitor-direction ASDU.
    ///
    /// Returns the number of points updated. Negative confirmations and
    /// control-direction ASDUs are ignored.
    pub fn ingest(&self, asdu: &Asdu) -> usize {
        if !asdu.type_id.is_monitor() || asdu.cot.negative {
            return 0;
        }
        let now = Instant::now();
        let mut updated = 0;
        for (ioa, group) in asdu.points() {
            let Some(value) = PointValue::from_element(&group.element) else {
                continue;
            };
            self.points.insert(
                ioa,
                Sample {
                    value,
                    type_id: asdu.type_id,
                    quality: group.element.quality().unwrap_or(Quality::GOOD),
                    received_at: now,
                },
            );
            updated += 1;
        }
        updated
    }

    pub fn insert(&self, ioa: u32, sample: Sample) {
        self.points.insert(ioa, sample);
    }

    pub fn get(&self, ioa: u32) -> Option<Sample> {
        self.points.get(&ioa).map(|entry| entry.value().clone())
    }

    /// The sample for `ioa` if it arrived at or after `since`.
    pub fn fresh_since(&self, ioa: u32, since: Instant) -> Option<Sample> {
        self.get(ioa).filter(|s| s.received_at >= since)
    }

    /// Samples in `from..=to` whose type matches `type_id` ignoring time tags.
    pub fn range(&self, from: u32, to: u32, type_id: TypeId) -> Vec<(u32, Sample)> {
        let wanted = type_id.without_time();
        let mut out: Vec<(u32, Sample)> = self
            .points
            .iter()
            .filter(|e| (from..=to).contains(e.key()) && e.value().type_id.without_time() == wanted)
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        out.sort_unstable_by_key(|(ioa, _)| *ioa);
        out
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.points.clear();
    }
}

/// Value types discovered per IOA.
///
/// The first observation wins and is kept for the life of the map unless
/// explicitly forgotten.
#[derive(Debug, Default)]
pub struct LearnedTypes {
    types: DashMap<u32, TypeId>,
}

impl LearnedTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `type_id` for `ioa` unless a type is already known, and
    /// returns the type now on record.
    pub fn learn(&self, ioa: u32, type_id: TypeId) -> TypeId {
        let known = *self.types.entry(ioa).or_insert(type_id);
        if known != type_id {
            log::debug!("IOA {ioa} reported as {type_id}, keeping learned {known}");
        }
        known
    }

    pub fn get(&self, ioa: u32) -> Option<TypeId> {
        self.types.get(&ioa).map(|entry| *entry)
    }

    pub fn forget(&self, ioa: u32) -> Option<TypeId> {
        self.types.remove(&ioa).map(|(_, type_id)| type_id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::{LearnedTypes, PointCache};
    use crate::value::PointValue;
    use rustiec_core::asdu::{Asdu, ElementGroup, InformationObject};
    use rustiec_core::element::InformationElement;
    use rustiec_core::types::{Cause, CauseOfTransmission, Quality, TypeId};
    use std::time::{Duration, Instant};

    fn floats(cause: Cause) -> Asdu {
        let point = |value| {
            ElementGroup::new(InformationElement::Float {
                value,
                quality: Quality::GOOD,
            })
        };
        let mut asdu = Asdu::new(TypeId::MeasuredFloat, cause, 1);
        asdu.sequence = true;
        asdu.push(InformationObject {
            address: 10,
            groups: vec![point(1.0), point(2.0), point(3.0)],
        });
        asdu
    }

    #[test]
    fn ingest_expands_sequences() {
        let cache = PointCache::new();
        assert_eq!(cache.ingest(&floats(Cause::InterrogatedByStation)), 3);
        assert_eq!(cache.get(12).unwrap().value, PointValue::Float(3.0));
        let range = cache.range(10, 11, TypeId::MeasuredFloatCp56);
        assert_eq!(range.iter().map(|(ioa, _)| *ioa).collect::<Vec<_>>(), [10, 11]);
        assert!(cache.range(10, 12, TypeId::SinglePoint).is_empty());
    }

    #[test]
    fn ingest_ignores_negative_and_control_asdus() {
        let cache = PointCache::new();
        let mut negative = floats(Cause::Spontaneous);
        negative.cot = CauseOfTransmission::negative(Cause::Spontaneous);
        assert_eq!(cache.ingest(&negative), 0);
        assert_eq!(cache.ingest(&Asdu::single_command(1, 5, true, false)), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn fresh_since_filters_old_samples() {
        let cache = PointCache::new();
        cache.ingest(&floats(Cause::Spontaneous));
        let later = Instant::now() + Duration::from_secs(1);
        assert!(cache.fresh_since(10, later).is_none());
        assert!(cache
            .fresh_since(10, Instant::now() - Duration::from_secs(1))
            .is_some());
    }

    #[test]
    fn first_learned_type_wins_until_forgotten() {
        let learned = LearnedTypes::new();
        assert_eq!(learned.learn(7, TypeId::MeasuredFloat), TypeId::MeasuredFloat);
        assert_eq!(learned.learn(7, TypeId::SinglePoint), TypeId::MeasuredFloat);
        assert_eq!(learned.forget(7), Some(TypeId::MeasuredFloat));
        assert_eq!(learned.learn(7, TypeId::SinglePoint), TypeId::SinglePoint);
    }
}
