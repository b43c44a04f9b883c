//! Property-based tests for voice eviction planning

use std::collections::HashSet;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use crate::core::voice::capacity::plan_eviction;
use crate::core::voice::types::VoiceSlot;

/// Voices with distinct ids, arbitrary ages and ownership.
fn account() -> impl Strategy<Value = Vec<VoiceSlot>> {
    prop::collection::vec((0i64..10_000, any::<bool>()), 0..30).prop_map(|entries| {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (minutes, managed))| {
                VoiceSlot::new(
                    &format!("v{:02}", i),
                    "voice",
                    base + Duration::minutes(minutes),
                    managed,
                )
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn never_evicts_unmanaged(voices in account(), limit in 0usize..30, needed in 1usize..4) {
        if let Ok(plan) = plan_eviction(&voices, voices.len(), limit, needed) {
            let unmanaged: HashSet<&str> = voices
                .iter()
                .filter(|v| !v.managed)
                .map(|v| v.voice_id.as_str())
                .collect();
            prop_assert!(plan.iter().all(|id| !unmanaged.contains(id.as_str())));
        }
    }

    #[test]
    fn successful_plan_makes_room(voices in account(), limit in 0usize..30, needed in 1usize..4) {
        match plan_eviction(&voices, voices.len(), limit, needed) {
            Ok(plan) => {
                prop_assert!(voices.len() - plan.len() + needed <= limit);
                let unique: HashSet<&String> = plan.iter().collect();
                prop_assert_eq!(unique.len(), plan.len());
            }
            Err(_) => {
                let managed = voices.iter().filter(|v| v.managed).count();
                prop_assert!(voices.len() + needed > limit + managed);
            }
        }
    }

    #[test]
    fn evicts_oldest_managed_first(voices in account(), limit in 0usize..30) {
        if let Ok(plan) = plan_eviction(&voices, voices.len(), limit, 1) {
            let evicted: HashSet<&str> = plan.iter().map(String::as_str).collect();
            let newest_evicted = voices
                .iter()
                .filter(|v| evicted.contains(v.voice_id.as_str()))
                .map(|v| (v.created_at, v.voice_id.clone()))
                .max();
            if let Some(newest) = newest_evicted {
                for kept in voices.iter().filter(|v| v.managed && !evicted.contains(v.voice_id.as_str())) {
                    prop_assert!((kept.created_at, kept.voice_id.clone()) > newest);
                }
            }
        }
    }
}
