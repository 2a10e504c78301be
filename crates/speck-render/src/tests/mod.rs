use crate::{
    CameraParams, RenderConfig, SplatAsset, SplatCollection, SplatRenderSystem,
    format::{DataFormat, FormatDescriptor},
    splat::Splat,
};
use assert_approx_eq::assert_approx_eq;
use glam::{Mat4, Quat, UVec2, Vec3};
use rand::Rng;


// Shows the dispatch spans when running with `--nocapture`.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn random_splats(num_splats: usize, extent: f32) -> Vec<Splat> {
    let mut rng = rand::rng();
    (0..num_splats)
        .map(|_| {
            let pos = Vec3::new(
                rng.random_range(-extent..extent),
                rng.random_range(-extent..extent),
                rng.random_range(-extent..extent),
            );
            let rot = Quat::from_euler(
                glam::EulerRot::XYZ,
                rng.random_range(-3.0..3.0),
                rng.random_range(-3.0..3.0),
                rng.random_range(-3.0..3.0),
            );
            let scale = Vec3::new(
                rng.random_range(0.01..0.2),
                rng.random_range(0.01..0.2),
                rng.random_range(0.01..0.2),
            );
            let rgb = Vec3::new(rng.random(), rng.random(), rng.random());
            Splat::from_color(pos, rot, scale, rgb, rng.random())
        })
        .collect()
}

fn camera() -> CameraParams {
    CameraParams::look_at(
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::ZERO,
        Vec3::Y,
        0.8,
        UVec2::new(512, 512),
    )
}

#[test]
fn renders_at_all() {
    // Zero sized splats still produce valid, minimal footprints.
    let splats = vec![
        Splat {
            scale: Vec3::ZERO,
            ..Default::default()
        };
        8
    ];
    let mut system = SplatRenderSystem::default();
    system.add(SplatCollection::from_splats(&splats, Mat4::IDENTITY));
    let outputs = system.render_frame(&camera());
    assert_eq!(outputs.len(), 1);

    for record in outputs[0].view_data {
        assert!(!record.is_degenerate());
        let axis = glam::Vec2::from_array(record.axis1);
        assert!(axis.is_finite());
        assert!(axis.length() > 0.0);
    }
}

#[test]
fn renders_many_splats() {
    init_logging();
    let num_splats = 1_000_000;
    let splats = random_splats(num_splats, 4.0);
    let mut system = SplatRenderSystem::default();
    system.add(SplatCollection::from_splats(&splats, Mat4::IDENTITY));
    let camera = camera();
    let outputs = system.render_frame(&camera);
    let output = &outputs[0];

    assert_eq!(output.view_data.len(), num_splats);
    assert_eq!(output.order.len(), num_splats);
    assert_eq!(output.draw.instance_count, num_splats as u32);

    // All splats are in front of the camera, depths go back to front.
    let depth = |i: u32| camera.view.transform_point3(splats[i as usize].pos).z;
    assert!(output.order.windows(2).all(|w| depth(w[0]) <= depth(w[1])));
    assert!(output.view_data.iter().all(|r| !r.is_degenerate()));
}

#[test]
fn quantized_asset_matches_full_precision() -> anyhow::Result<()> {
    init_logging();
    let splats = random_splats(2000, 2.0);
    let formats = FormatDescriptor::new(
        DataFormat::Norm11,
        DataFormat::Norm11,
        DataFormat::Norm6,
        DataFormat::Norm8,
    )?;
    let asset = SplatAsset::encode(&splats, formats, true)?;
    assert_eq!(asset.chunks.as_ref().map(Vec::len), Some(8));

    let mut system = SplatRenderSystem::default();
    system.add(SplatCollection::new(&asset, Mat4::IDENTITY));
    system.add(SplatCollection::from_splats(&splats, Mat4::IDENTITY));

    let camera = camera();
    let outputs = system.render_frame(&camera);
    assert_eq!(outputs.len(), 2);

    for (quantized, full) in outputs[0].view_data.iter().zip(outputs[1].view_data) {
        let screen_q = camera.clip_to_screen(glam::Vec4::from_array(quantized.clip_pos));
        let screen_f = camera.clip_to_screen(glam::Vec4::from_array(full.clip_pos));
        let (Some(q), Some(f)) = (screen_q, screen_f) else {
            panic!("Splats in front of the camera");
        };
        // Positions quantize to ~1/1000 of a 4 unit chunk, a fraction of a pixel here.
        assert!((q - f).length() < 1.0, "Screen positions differ: {q} vs {f}");
        assert_approx_eq!(quantized.color().w, full.color().w, 1.0 / 255.0 + 1e-3);
    }
    Ok(())
}

#[test]
fn config_changes_output() {
    let splat = Splat::from_color(
        Vec3::ZERO,
        Quat::IDENTITY,
        Vec3::splat(0.1),
        Vec3::new(0.2, 0.4, 0.6),
        0.5,
    );
    let mut system = SplatRenderSystem::new(RenderConfig {
        splat_scale: 2.0,
        opacity_scale: 2.0,
        ..Default::default()
    });
    system.add(SplatCollection::from_splats(&[splat], Mat4::IDENTITY));
    let scaled = system.render_frame(&camera())[0].view_data[0];

    system.config = RenderConfig::default();
    let base = system.render_frame(&camera())[0].view_data[0];

    let len = |axis: [f32; 2]| glam::Vec2::from_array(axis).length();
    assert!(len(scaled.axis1) > 1.9 * len(base.axis1));
    assert_approx_eq!(scaled.color().w, 1.0, 1e-3);
    assert_approx_eq!(base.color().w, 0.5, 1e-3);
}
