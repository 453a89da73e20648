/*!
 * Stealable Queues
 * Eviction priority ladder, least valuable data first
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Queue a stealable waits in while nothing needs it loaded
///
/// Queues are scanned in declaration order. Data that does not belong to the current
/// song goes before current-song data, re-pitched and percussion caches before the
/// sample data they were derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StealableQueue {
    NoSongSampleDataRepitchedCache,
    NoSongSampleDataPercCache,
    NoSongSampleData,
    NoSongSampleDataConverted,
    NoSongWavetableBandData,
    NoSongAudioFileObjects,
    CurrentSongSampleDataRepitchedCache,
    CurrentSongSampleDataPercCache,
    CurrentSongSampleData,
    CurrentSongSampleDataConverted,
}

impl StealableQueue {
    pub const COUNT: usize = 10;

    pub const ALL: [StealableQueue; Self::COUNT] = [
        StealableQueue::NoSongSampleDataRepitchedCache,
        StealableQueue::NoSongSampleDataPercCache,
        StealableQueue::NoSongSampleData,
        StealableQueue::NoSongSampleDataConverted,
        StealableQueue::NoSongWavetableBandData,
        StealableQueue::NoSongAudioFileObjects,
        StealableQueue::CurrentSongSampleDataRepitchedCache,
        StealableQueue::CurrentSongSampleDataPercCache,
        StealableQueue::CurrentSongSampleData,
        StealableQueue::CurrentSongSampleDataConverted,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Last queue scanned; its members are never re-queued on reassessment
    #[inline]
    pub const fn is_last(self) -> bool {
        self.index() == Self::COUNT - 1
    }

    /// Whether the data is tied to the loaded song
    pub const fn is_current_song(self) -> bool {
        self.index() >= StealableQueue::CurrentSongSampleDataRepitchedCache.index()
    }
}

impl fmt::Display for StealableQueue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
