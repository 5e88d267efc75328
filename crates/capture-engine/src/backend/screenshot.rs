//! Screenshot-per-frame capture through `xcap`.

use image::{imageops, Rgba, RgbaImage};
use reelcap_common::error::{ReelcapError, ReelcapResult};
use reelcap_platform_core::{CaptureRegion, Frame, MonitorDescriptor, MonitorEnumerator};
use xcap::Monitor;

use super::{FrameSource, FrameSourceFactory};

/// Monitor enumeration through xcap.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapMonitors;

impl MonitorEnumerator for XcapMonitors {
    fn monitors(&self) -> ReelcapResult<Vec<MonitorDescriptor>> {
        let monitors = Monitor::all()
            .map_err(|e| ReelcapError::platform(format!("Failed to enumerate monitors: {e}")))?;
        Ok(monitors
            .iter()
            .enumerate()
            .map(|(index, monitor)| describe(index, monitor))
            .collect())
    }
}

fn describe(index: usize, monitor: &Monitor) -> MonitorDescriptor {
    MonitorDescriptor {
        index,
        name: monitor.name().to_string(),
        left: monitor.x(),
        top: monitor.y(),
        width: i32::try_from(monitor.width()).unwrap_or(i32::MAX),
        height: i32::try_from(monitor.height()).unwrap_or(i32::MAX),
        primary: monitor.is_primary(),
    }
}

/// Crops each frame out of a full screenshot of one monitor.
pub struct ScreenshotFrameSource {
    monitor: Monitor,
    monitor_origin: (i32, i32),
    region: CaptureRegion,
}

impl ScreenshotFrameSource {
    pub fn open(region: CaptureRegion) -> ReelcapResult<Self> {
        let monitors = Monitor::all()
            .map_err(|e| ReelcapError::capture(format!("Failed to enumerate monitors: {e}")))?;
        let descriptors: Vec<MonitorDescriptor> = monitors
            .iter()
            .enumerate()
            .map(|(index, monitor)| describe(index, monitor))
            .collect();

        let index = monitor_for_region(&descriptors, &region).ok_or_else(|| {
            ReelcapError::capture(format!("No monitor overlaps capture region {region}"))
        })?;
        let descriptor = &descriptors[index];
        tracing::info!(
            %region,
            monitor = %descriptor.name,
            "Screenshot capture bound to monitor"
        );

        let monitor_origin = (descriptor.left, descriptor.top);
        let monitor = monitors
            .into_iter()
            .nth(index)
            .ok_or_else(|| ReelcapError::capture("Monitor list changed during open"))?;

        Ok(Self {
            monitor,
            monitor_origin,
            region,
        })
    }
}

impl FrameSource for ScreenshotFrameSource {
    fn capture(&mut self) -> ReelcapResult<Frame> {
        let shot = self
            .monitor
            .capture_image()
            .map_err(|e| ReelcapError::capture(format!("Screenshot failed: {e}")))?;
        if shot.width() == 0 || shot.height() == 0 {
            return Err(ReelcapError::capture("Screenshot returned an empty image"));
        }
        Ok(Frame::new(crop_to_region(&shot, self.monitor_origin, &self.region)))
    }

    fn region(&self) -> CaptureRegion {
        self.region
    }

    fn name(&self) -> &str {
        "screenshot"
    }
}

/// Opens [`ScreenshotFrameSource`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScreenshotSourceFactory;

impl FrameSourceFactory for ScreenshotSourceFactory {
    fn open(&self, region: CaptureRegion) -> ReelcapResult<Box<dyn FrameSource>> {
        Ok(Box::new(ScreenshotFrameSource::open(region)?))
    }

    fn is_available(&self) -> bool {
        XcapMonitors
            .monitors()
            .map(|list| !list.is_empty())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "screenshot"
    }
}

/// Monitor containing the region's origin, else the one it overlaps most.
fn monitor_for_region(monitors: &[MonitorDescriptor], region: &CaptureRegion) -> Option<usize> {
    let contains_origin = monitors.iter().position(|m| {
        m.region()
            .and_then(|r| r.to_relative(region.x(), region.y()))
            .is_some()
    });
    contains_origin.or_else(|| {
        monitors
            .iter()
            .enumerate()
            .map(|(index, m)| (index, overlap_area(m, region)))
            .filter(|(_, area)| *area > 0)
            .max_by_key(|(_, area)| *area)
            .map(|(index, _)| index)
    })
}

fn overlap_area(monitor: &MonitorDescriptor, region: &CaptureRegion) -> i64 {
    let left = i64::from(monitor.left).max(i64::from(region.x()));
    let top = i64::from(monitor.top).max(i64::from(region.y()));
    let right = (i64::from(monitor.left) + i64::from(monitor.width))
        .min(i64::from(region.x()) + i64::from(region.width()));
    let bottom = (i64::from(monitor.top) + i64::from(monitor.height))
        .min(i64::from(region.y()) + i64::from(region.height()));
    (right - left).max(0) * (bottom - top).max(0)
}

/// Cut `region` out of a screenshot whose top-left sits at `origin`.
/// Pixels outside the screenshot are black.
fn crop_to_region(shot: &RgbaImage, origin: (i32, i32), region: &CaptureRegion) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(region.width(), region.height(), Rgba([0, 0, 0, 255]));
    let offset_x = i64::from(origin.0) - i64::from(region.x());
    let offset_y = i64::from(origin.1) - i64::from(region.y());
    imageops::replace(&mut canvas, shot, offset_x, offset_y);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(index: usize, left: i32, top: i32, width: i32, height: i32) -> MonitorDescriptor {
        MonitorDescriptor {
            index,
            name: format!("HDMI-{index}"),
            left,
            top,
            width,
            height,
            primary: index == 0,
        }
    }

    #[test]
    fn region_binds_to_monitor_holding_its_origin() {
        let monitors = vec![monitor(0, 0, 0, 1920, 1080), monitor(1, 1920, 0, 1280, 1024)];
        let region = CaptureRegion::new(2000, 100, 300, 300).unwrap();
        assert_eq!(monitor_for_region(&monitors, &region), Some(1));
    }

    #[test]
    fn region_starting_off_screen_uses_largest_overlap() {
        let monitors = vec![monitor(0, 0, 0, 1920, 1080), monitor(1, 1920, 0, 1280, 1024)];
        let region = CaptureRegion::new(1800, -200, 600, 400).unwrap();
        assert_eq!(monitor_for_region(&monitors, &region), Some(1));

        let nowhere = CaptureRegion::new(-5000, -5000, 100, 100).unwrap();
        assert_eq!(monitor_for_region(&monitors, &nowhere), None);
    }

    #[test]
    fn crop_copies_region_and_pads_outside_with_black() {
        let shot = RgbaImage::from_fn(8, 8, |x, y| Rgba([x as u8, y as u8, 200, 255]));
        let region = CaptureRegion::new(106, 102, 4, 2).unwrap();
        let cropped = crop_to_region(&shot, (100, 100), &region);

        assert_eq!((cropped.width(), cropped.height()), (4, 2));
        assert_eq!(*cropped.get_pixel(0, 0), Rgba([6, 2, 200, 255]));
        assert_eq!(*cropped.get_pixel(1, 1), Rgba([7, 3, 200, 255]));
        // Columns past the screenshot's right edge.
        assert_eq!(*cropped.get_pixel(2, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*cropped.get_pixel(3, 1), Rgba([0, 0, 0, 255]));
    }
}
