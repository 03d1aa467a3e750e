use crate::adapter::ClientAdapter;
use crate::cache::PointCache;
use crate::settings::BlockRange;
use crate::value::Sample;
use crate::ClientError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::RwLock;
use std::time::Instant;

/// Batched view of one contiguous IOA range of a single value type.
///
/// A refresh interrogates the station once and harvests every sample inside
/// the range that the interrogation produced; between refreshes reads are
/// served from the last snapshot.
#[derive(Debug)]
pub struct BlockReader {
    range: BlockRange,
    snapshot: RwLock<BTreeMap<u32, Sample>>,
    refreshes: AtomicU64,
}

impl BlockReader {
    pub fn new(range: BlockRange) -> Self {
        Self {
            range,
            snapshot: RwLock::new(BTreeMap::new()),
            refreshes: AtomicU64::new(0),
        }
    }

    pub fn range(&self) -> &BlockRange {
        &self.range
    }

    pub fn covers(&self, ioa: u32) -> bool {
        self.range.contains(ioa)
    }

    /// Number of refreshes performed so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Interrogates the station and replaces the snapshot with the samples
    /// in range that arrived since. Returns the number of points harvested.
    pub async fn refresh(&self, adapter: &ClientAdapter) -> Result<usize, ClientError> {
        let since = Instant::now();
        if !adapter.general_interrogation().await? {
            log::debug!("block {}: interrogation not terminated in time", self.range);
        }
        Ok(self.harvest(adapter.cache(), since))
    }

    /// Replaces the snapshot with the cached samples in range received at or
    /// after `since`.
    pub fn harvest(&self, cache: &PointCache, since: Instant) -> usize {
        let harvested: BTreeMap<u32, Sample> = cache
            .range(self.range.from, self.range.to, self.range.type_id)
            .into_iter()
            .filter(|(_, sample)| sample.received_at >= since)
            .collect();
        let count = harvested.len();
        *self.snapshot.write() = harvested;
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        log::debug!("block {}: {count} point(s)", self.range);
        count
    }

    pub fn get(&self, ioa: u32) -> Option<Sample> {
        self.snapshot.read().get(&ioa).cloned()
    }

    /// The last harvested samples, ordered by IOA.
    pub fn snapshot(&self) -> Vec<(u32, Sample)> {
        self.snapshot
            .read()
            .iter()
            .map(|(ioa, s)| (*ioa, s.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::BlockReader;
    use crate::cache::PointCache;
    use crate::value::{PointValue, Sample};
    use rustiec_core::types::{Quality, TypeId};
    use std::time::{Duration, Instant};

    fn sample(value: f64, received_at: Instant) -> Sample {
        Sample {
            value: PointValue::Float(value),
            type_id: TypeId::MeasuredFloat,
            quality: Quality::GOOD,
            received_at,
        }
    }

    #[test]
    fn harvest_skips_samples_older_than_the_cycle() {
        let cache = PointCache::new();
        let cycle = Instant::now();
        cache.insert(100, sample(1.0, cycle - Duration::from_secs(5)));
        cache.insert(101, sample(2.0, cycle));
        cache.insert(102, sample(3.0, cycle + Duration::from_millis(1)));
        cache.insert(200, sample(4.0, cycle));

        let block = BlockReader::new("13:100-150".parse().unwrap());
        assert_eq!(block.harvest(&cache, cycle), 2);
        assert!(block.get(100).is_none());
        assert_eq!(
            block.snapshot().iter().map(|(ioa, _)| *ioa).collect::<Vec<_>>(),
            [101, 102]
        );
        assert_eq!(block.refresh_count(), 1);
    }
}
