#![cfg(feature = "integration-tests")]

use std::{path::PathBuf, rc::Rc};

use image::{Rgba, RgbaImage};
use reef_ngin::{
    context,
    data_structures::{
        camera::Camera,
        material::{Material, PropertyBlock},
        mesh::Mesh,
        renderer::MeshRenderer,
        scene_graph::{Scene, SceneObject},
    },
    flow::{Engine, FrameContext},
    math::Vec3,
    pipelines::WgpuBackend,
    render::{
        backend::GpuBackend,
        pipeline::{RenderPipeline, RenderSettings},
    },
};

const SIZE: u32 = 64;

fn shader_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets").join("shaders")
}

/// Renders one frame of `scene` off-screen and reads it back.
fn render_headless(scene: Scene, settings: RenderSettings) -> RgbaImage {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async move {
        let instance = context::instance();
        let (_, device, queue) = context::request_device(&instance, None).await.unwrap();
        let mut backend = WgpuBackend::new(device, queue, wgpu::TextureFormat::Rgba8Unorm);
        let target = backend.create_framebuffer(SIZE, SIZE).unwrap();
        backend.set_screen_framebuffer(&target).unwrap();

        let settings = RenderSettings {
            shader_root: shader_root(),
            width: SIZE,
            height: SIZE,
            ..settings
        };
        let mut engine = Engine::new(scene, RenderPipeline::new(settings));
        engine.resize(SIZE, SIZE);
        engine
            .run_frame(&FrameContext::new(0.016, 0.0, 0), &mut backend)
            .unwrap();
        backend.read_framebuffer(&target).await.unwrap()
    })
}

fn assert_filled(image: &RgbaImage, expected: Rgba<u8>) {
    assert_eq!(image.dimensions(), (SIZE, SIZE));
    for pixel in image.pixels() {
        assert_eq!(*pixel, expected);
    }
}

#[test]
fn should_render_settings_clear_colour_without_camera() {
    let settings = RenderSettings {
        clear_color: [1.0, 1.0, 1.0, 1.0],
        ..RenderSettings::default()
    };
    let image = render_headless(Scene::new(), settings);
    assert_filled(&image, Rgba([255, 255, 255, 255]));
}

#[test]
fn should_render_camera_clear_colour() {
    let mut camera = Camera::default();
    camera.clear_color = [1.0, 0.0, 0.0, 1.0];
    let mut scene = Scene::new();
    scene.add_object(SceneObject::new("Camera").with_component(camera));

    let image = render_headless(scene, RenderSettings::default());
    assert_filled(&image, Rgba([255, 0, 0, 255]));
}

#[test]
fn should_render_unlit_quad_in_front_of_camera() {
    let mut camera = Camera::default();
    camera.clear_color = [0.0, 0.0, 0.0, 1.0];
    let mut scene = Scene::new();
    scene.add_object(SceneObject::new("Camera").with_component(camera));

    let mut properties = PropertyBlock::new();
    properties.set_vector3("_Color", Vec3::new(0.0, 1.0, 0.0));
    properties.set_float("_Alpha", 1.0);
    let material = Rc::new(Material::new("Unlit", "unlit", "unlit").with_both_faces(true));
    let quad = Rc::new(Mesh::quad(2.0, Vec3::new(0.0, 0.0, 5.0)));
    scene.add_object(
        SceneObject::new("Quad")
            .with_component(MeshRenderer::new(quad, material).with_properties(properties)),
    );

    let image = render_headless(scene, RenderSettings::default());
    let centre = image.get_pixel(SIZE / 2, SIZE / 2);
    assert_eq!(*centre, Rgba([0, 255, 0, 255]));
    // the quad covers well under half the view at this distance
    assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
}
