use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};

/// Camera state for one frame.
///
/// View space is right handed with the camera looking down -Z. The projection
/// maps points in front of the camera to a positive clip `w`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraParams {
    pub view: Mat4,
    pub projection: Mat4,
    pub screen_size: UVec2,
    pub position: Vec3,
}

impl CameraParams {
    pub fn new(view: Mat4, projection: Mat4, screen_size: UVec2) -> Self {
        let position = view.inverse().w_axis.truncate();
        Self {
            view,
            projection,
            screen_size,
            position,
        }
    }

    /// Perspective camera at `eye` looking at `target`, with a vertical field of
    /// view in radians.
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, fov_y: f32, screen_size: UVec2) -> Self {
        let aspect = screen_size.x as f32 / screen_size.y.max(1) as f32;
        let view = Mat4::look_at_rh(eye, target, up);
        let projection = Mat4::perspective_rh(fov_y, aspect, 0.01, 1000.0);
        Self {
            view,
            projection,
            screen_size,
            position: eye,
        }
    }

    pub fn screen_size_f32(&self) -> Vec2 {
        self.screen_size.as_vec2()
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Focal lengths in pixels.
    pub fn focal(&self) -> Vec2 {
        Vec2::new(self.projection.x_axis.x, self.projection.y_axis.y) * self.screen_size_f32() * 0.5
    }

    /// Tangent of half the field of view on both axes.
    pub fn tan_fov(&self) -> Vec2 {
        Vec2::new(
            1.0 / self.projection.x_axis.x,
            1.0 / self.projection.y_axis.y,
        )
    }

    /// Pixel position of a clip space point, origin at the top left with y
    /// pointing down. `None` for points behind the camera.
    pub fn clip_to_screen(&self, clip: Vec4) -> Option<Vec2> {
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate().truncate() / clip.w;
        let uv = Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
        Some(uv * self.screen_size_f32())
    }

    pub fn world_to_screen(&self, world: Vec3) -> Option<Vec2> {
        self.clip_to_screen(self.view_projection() * world.extend(1.0))
    }
}
