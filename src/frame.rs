//! Frame-agnostic capture logic: acquisition classification, planar
//! output format selection, and cursor placement math. Kept free of
//! platform types so it is exercised by tests on any host.

/// Planar output format produced by a conversion pipeline: luma plane
/// followed by interleaved half-resolution chroma.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanarFormat {
    /// 8-bit Y + interleaved UV (NV12).
    Nv12,
    /// 10-bit equivalent (P010).
    P010,
}

impl PlanarFormat {
    pub const fn bits_per_component(self) -> u32 {
        match self {
            Self::Nv12 => 8,
            Self::P010 => 10,
        }
    }
}

/// What an acquired duplication frame actually carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateFlags {
    /// Pointer moved, changed visibility, or delivered a new shape.
    pub mouse_update: bool,
    /// The desktop image itself changed.
    pub frame_update: bool,
}

impl UpdateFlags {
    pub const fn any(self) -> bool {
        self.mouse_update || self.frame_update
    }
}

/// Classify an acquisition from the duplication frame metadata.
///
/// The duplication interface can wake the caller with a frame that
/// carries neither image nor pointer changes; such acquisitions are
/// treated as timeouts by the session.
pub fn classify_update(
    accumulated_frames: u32,
    last_present_time: i64,
    last_mouse_update_time: i64,
    pointer_shape_buffer_size: u32,
) -> UpdateFlags {
    UpdateFlags {
        mouse_update: last_mouse_update_time != 0 || pointer_shape_buffer_size > 0,
        frame_update: accumulated_frames != 0 || last_present_time != 0,
    }
}

/// Cursor viewport state for one conversion pipeline, in output-surface
/// coordinates. Positions arrive in input (desktop) coordinates and are
/// scaled by the pipeline's output/input ratio.
#[derive(Clone, Copy, Debug)]
pub struct CursorPlacement {
    scale: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub visible: bool,
}

impl CursorPlacement {
    pub fn new(input_width: u32, output_width: u32) -> Self {
        Self {
            scale: output_width as f32 / input_width as f32,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            visible: false,
        }
    }

    /// Record a new shape size (in input pixels).
    pub fn set_shape_size(&mut self, width: u32, height: u32) {
        self.width = width as f32 * self.scale;
        self.height = height as f32 * self.scale;
    }

    /// Record a pointer position update. While invisible the position is
    /// left stale; the overlay draw is skipped so the value never renders.
    pub fn set_position(&mut self, x: i32, y: i32, visible: bool) {
        self.visible = visible;

        if !visible {
            return;
        }

        self.x = x as f32 * self.scale;
        self.y = y as f32 * self.scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spurious_wake_carries_no_update() {
        let flags = classify_update(0, 0, 0, 0);
        assert!(!flags.any());
    }

    #[test]
    fn accumulated_frames_mark_a_frame_update() {
        let flags = classify_update(2, 0, 0, 0);
        assert!(flags.frame_update);
        assert!(!flags.mouse_update);
    }

    #[test]
    fn present_time_alone_marks_a_frame_update() {
        assert!(classify_update(0, 123_456, 0, 0).frame_update);
    }

    #[test]
    fn mouse_time_or_shape_marks_a_mouse_update() {
        assert!(classify_update(0, 0, 99, 0).mouse_update);
        assert!(classify_update(0, 0, 0, 128).mouse_update);
    }

    #[test]
    fn pointer_only_update_is_not_a_frame_update() {
        let flags = classify_update(0, 0, 77, 128);
        assert!(flags.mouse_update);
        assert!(!flags.frame_update);
    }

    #[test]
    fn placement_scales_position_by_output_ratio() {
        let mut placement = CursorPlacement::new(1920, 1280);
        placement.set_position(300, 150, true);
        assert!((placement.x - 200.0).abs() < f32::EPSILON);
        assert!((placement.y - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn placement_scales_shape_size() {
        let mut placement = CursorPlacement::new(1920, 960);
        placement.set_shape_size(32, 32);
        assert!((placement.width - 16.0).abs() < f32::EPSILON);
        assert!((placement.height - 16.0).abs() < f32::EPSILON);
    }

    #[test]
    fn invisible_update_leaves_position_stale() {
        let mut placement = CursorPlacement::new(100, 100);
        placement.set_position(10, 20, true);
        placement.set_position(500, 600, false);
        assert!(!placement.visible);
        assert!((placement.x - 10.0).abs() < f32::EPSILON);
        assert!((placement.y - 20.0).abs() < f32::EPSILON);
    }

    #[test]
    fn planar_format_bit_depth() {
        assert_eq!(PlanarFormat::Nv12.bits_per_component(), 8);
        assert_eq!(PlanarFormat::P010.bits_per_component(), 10);
    }
}
