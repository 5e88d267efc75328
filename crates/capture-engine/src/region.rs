//! Turns the user's capture selection into one concrete rectangle.

use reelcap_common::error::{ReelcapError, ReelcapResult};
use reelcap_platform_core::{CaptureRegion, MonitorDescriptor, MonitorEnumerator, RegionSelection};

/// Resolve `selection` against the current monitor topology.
///
/// Explicit regions are returned verbatim. Monitor indices are checked
/// against a fresh enumeration and fail with
/// [`ReelcapError::InvalidMonitorSelection`] when stale. The default target
/// is the primary display clamped to 1920×1080 at the origin.
pub fn resolve_region(
    selection: &RegionSelection,
    monitors: &dyn MonitorEnumerator,
) -> ReelcapResult<CaptureRegion> {
    match *selection {
        RegionSelection::Explicit(region) => Ok(region),
        RegionSelection::Monitor(index) => resolve_monitor(index, monitors),
        RegionSelection::Default => Ok(default_region(monitors)),
    }
}

fn resolve_monitor(index: usize, monitors: &dyn MonitorEnumerator) -> ReelcapResult<CaptureRegion> {
    let list = monitors.monitors().map_err(|e| {
        ReelcapError::invalid_monitor(format!("cannot enumerate monitors for screen {}: {e}", index + 1))
    })?;

    let monitor = list.get(index).ok_or_else(|| {
        ReelcapError::invalid_monitor(format!(
            "screen {} does not exist ({} connected)",
            index + 1,
            list.len()
        ))
    })?;

    monitor.region().ok_or_else(|| {
        ReelcapError::invalid_monitor(format!(
            "screen {} reports an invalid size {}x{}",
            index + 1,
            monitor.width,
            monitor.height
        ))
    })
}

fn default_region(monitors: &dyn MonitorEnumerator) -> CaptureRegion {
    let primary = match monitors.monitors() {
        Ok(list) => primary_region(&list),
        Err(e) => {
            tracing::warn!(error = %e, "Monitor enumeration failed; using default capture size");
            None
        }
    };
    primary
        .map(|region| region.clamped_at_origin())
        .unwrap_or_else(CaptureRegion::default_capture)
}

fn primary_region(list: &[MonitorDescriptor]) -> Option<CaptureRegion> {
    list.iter()
        .find(|m| m.primary)
        .or_else(|| list.first())?
        .region()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn monitor(index: usize, left: i32, width: i32, height: i32, primary: bool) -> MonitorDescriptor {
        MonitorDescriptor {
            index,
            name: format!("DP-{index}"),
            left,
            top: 0,
            width,
            height,
            primary,
        }
    }

    struct Broken;

    impl MonitorEnumerator for Broken {
        fn monitors(&self) -> ReelcapResult<Vec<MonitorDescriptor>> {
            Err(ReelcapError::platform("no display"))
        }
    }

    fn dual_head() -> Vec<MonitorDescriptor> {
        vec![
            monitor(0, 0, 2560, 1440, false),
            monitor(1, 2560, 1280, 1024, true),
        ]
    }

    #[test]
    fn explicit_region_is_returned_verbatim() {
        let region = CaptureRegion::new(-50, 3000, 9000, 20).unwrap();
        let resolved = resolve_region(&RegionSelection::Explicit(region), &Broken).unwrap();
        assert_eq!(resolved, region);
    }

    #[test]
    fn monitor_index_uses_fresh_geometry() {
        let resolved = resolve_region(&RegionSelection::Monitor(1), &dual_head()).unwrap();
        assert_eq!(resolved.as_tuple(), (2560, 0, 1280, 1024));
    }

    #[test]
    fn stale_or_bogus_monitor_is_rejected() {
        for (selection, monitors) in [
            (RegionSelection::Monitor(2), dual_head()),
            (RegionSelection::Monitor(0), vec![monitor(0, 0, 0, 1080, true)]),
        ] {
            let err = resolve_region(&selection, &monitors).unwrap_err();
            assert!(matches!(err, ReelcapError::InvalidMonitorSelection { .. }));
        }
        let err = resolve_region(&RegionSelection::Monitor(0), &Broken).unwrap_err();
        assert!(matches!(err, ReelcapError::InvalidMonitorSelection { .. }));
    }

    #[test]
    fn default_uses_primary_clamped_at_origin() {
        let resolved = resolve_region(&RegionSelection::Default, &dual_head()).unwrap();
        assert_eq!(resolved.as_tuple(), (0, 0, 1280, 1024));

        let big = vec![monitor(0, 100, 3840, 2160, false)];
        let resolved = resolve_region(&RegionSelection::Default, &big).unwrap();
        assert_eq!(resolved.as_tuple(), (0, 0, 1920, 1080));
    }

    #[test]
    fn default_survives_missing_topology() {
        let resolved = resolve_region(&RegionSelection::Default, &Broken).unwrap();
        assert_eq!(resolved.as_tuple(), (0, 0, 1920, 1080));
        let resolved = resolve_region(&RegionSelection::Default, &Vec::<MonitorDescriptor>::new()).unwrap();
        assert_eq!(resolved.as_tuple(), (0, 0, 1920, 1080));
    }

    proptest! {
        #[test]
        fn default_never_exceeds_clamp(width in -10i32..8000, height in -10i32..8000) {
            let monitors = vec![monitor(0, 0, width, height, true)];
            let region = resolve_region(&RegionSelection::Default, &monitors).unwrap();
            prop_assert_eq!((region.x(), region.y()), (0, 0));
            prop_assert!(region.width() >= 1 && region.width() <= 1920);
            prop_assert!(region.height() >= 1 && region.height() <= 1080);
        }
    }
}
