use glam::{Mat4, Vec3};
use pixelscene_render::RenderView;

/// Orthographic camera bound to a viewport.
///
/// The view parameters are shared with the renderer-agnostic layer; this
/// type only adds the viewport the projection is sized against.
#[derive(Debug, Clone, Copy)]
pub struct OrthoCamera {
    pub view: RenderView,
    width: u32,
    height: u32,
}

impl OrthoCamera {
    pub fn new(view: RenderView, width: u32, height: u32) -> Self {
        Self {
            view,
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Unit vector from the eye towards the target.
    pub fn forward(&self) -> Vec3 {
        (self.view.target - self.view.eye).normalize_or(Vec3::NEG_Z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view.view_matrix()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.view.projection_matrix(self.width, self.height)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.view.view_projection(self.width, self.height)
    }

    pub fn depth_range(&self) -> (f32, f32) {
        (self.view.near, self.view.far)
    }
}

impl Default for OrthoCamera {
    fn default() -> Self {
        Self::new(RenderView::default(), 1280, 720)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_looks_down_at_origin() {
        let cam = OrthoCamera::default();
        assert!(cam.view.eye.y > 0.0);
        assert!(cam.forward().y < 0.0);
        let vp = cam.view_projection();
        assert!(!vp.col(0).x.is_nan());

        // Origin lands in the middle of the screen.
        let origin = vp.project_point3(Vec3::ZERO);
        assert!(origin.x.abs() < 1e-5 && origin.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&origin.z));
    }

    #[test]
    fn resize_clamps_to_one_pixel() {
        let mut cam = OrthoCamera::default();
        cam.resize(0, 0);
        assert_eq!(cam.viewport(), (1, 1));
        assert_eq!(cam.aspect(), 1.0);
    }

    #[test]
    fn wider_viewport_shows_more_world() {
        let mut cam = OrthoCamera::default();
        let point = Vec3::new(0.5, 0.0, 0.0);
        cam.resize(840, 420);
        let narrow = cam.view_projection().project_point3(point).x;
        cam.resize(1680, 420);
        let wide = cam.view_projection().project_point3(point).x;
        assert!((narrow - 2.0 * wide).abs() < 1e-5);
    }
}
