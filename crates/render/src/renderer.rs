use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::scene::SceneGraph;

/// Orthographic camera/view configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderView {
    /// Camera position in world space.
    pub eye: Vec3,
    /// Point the camera is looking at.
    pub target: Vec3,
    /// Screen pixels per world unit.
    pub zoom: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 2.0 * (std::f32::consts::PI / 6.0).tan(), 2.0),
            target: Vec3::ZERO,
            zoom: 420.0,
            near: 0.1,
            far: 10.0,
        }
    }
}

impl RenderView {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    /// Orthographic projection for a viewport in physical pixels.
    ///
    /// The visible half-extent is `size / (2 * zoom)` world units, so the
    /// on-screen size of the scene does not change with the window.
    pub fn projection_matrix(&self, width: u32, height: u32) -> Mat4 {
        let zoom = self.zoom.max(f32::EPSILON);
        let half_w = width.max(1) as f32 / (2.0 * zoom);
        let half_h = height.max(1) as f32 / (2.0 * zoom);
        Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, self.near, self.far)
    }

    pub fn view_projection(&self, width: u32, height: u32) -> Mat4 {
        self.projection_matrix(width, height) * self.view_matrix()
    }
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// Renderers read the scene graph produced by the projection. They never
/// touch the entity store.
pub trait Renderer {
    type Output;

    fn render(&self, scene: &SceneGraph, view: &RenderView) -> Self::Output;
}

/// Text dump of the scene graph, for the CLI and tests.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, scene: &SceneGraph, view: &RenderView) -> String {
        let mut out = format!("=== Scene ({} nodes) ===\n", scene.len());
        out.push_str(&format!(
            "Camera: eye=({:.2}, {:.2}, {:.2}) target=({:.2}, {:.2}, {:.2}) zoom={:.0}\n",
            view.eye.x,
            view.eye.y,
            view.eye.z,
            view.target.x,
            view.target.y,
            view.target.z,
            view.zoom
        ));
        for (handle, node) in scene.iter() {
            let p = node.transform.position;
            out.push_str(&format!(
                "  {handle} entity={} mesh={:?} pos=({:.2}, {:.2}, {:.2})",
                node.entity, node.spec.mesh, p.x, p.y, p.z
            ));
            if node.emissive_intensity > 0.0 {
                out.push_str(&format!(" emissive={:.2}", node.emissive_intensity));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::NodeBackend;
    use pixelscene_ecs::{Component, EntityStore, MaterialSpec, MeshKind, RenderSpec};

    #[test]
    fn debug_renderer_empty_scene() {
        let output = DebugTextRenderer::new().render(&SceneGraph::new(), &RenderView::default());
        assert!(output.contains("0 nodes"));
        assert!(output.contains("zoom=420"));
    }

    #[test]
    fn debug_renderer_lists_nodes() {
        let mut store = EntityStore::new();
        let spec = RenderSpec::new(MeshKind::Icosahedron, MaterialSpec::solid(0x2379cf));
        let e = store
            .create_entity([
                Component::Render(spec),
                Component::Position(Vec3::new(1.0, 2.0, 3.0)),
                Component::Emissive(0.75),
            ])
            .unwrap();
        let mut scene = SceneGraph::new();
        scene.create_node(e, &store);

        let output = DebugTextRenderer::new().render(&scene, &RenderView::default());
        assert!(output.contains("1 nodes"));
        assert!(output.contains("mesh=Icosahedron"));
        assert!(output.contains("pos=(1.00, 2.00, 3.00)"));
        assert!(output.contains("emissive=0.75"));
    }

    #[test]
    fn ortho_extent_tracks_viewport_and_zoom() {
        let view = RenderView::default();
        let proj = view.projection_matrix(840, 420);
        // Half-extent is 1.0 x 0.5 world units at zoom 420.
        let edge = proj.project_point3(Vec3::new(1.0, 0.5, -1.0));
        assert!((edge.x - 1.0).abs() < 1e-5);
        assert!((edge.y - 1.0).abs() < 1e-5);
    }
}
