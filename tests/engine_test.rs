mod common;

use std::{cell::RefCell, rc::Rc};

use approx::assert_relative_eq;
use common::test_utils::{RecordingBackend, material, test_pipeline};
use reef_ngin::{
    KeyCode,
    behaviours::FlyController,
    data_structures::{
        camera::Camera,
        mesh::Mesh,
        renderer::MeshRenderer,
        scene_graph::{Behaviour, BehaviourContext, Component, Scene, SceneObject},
        transform::Transform,
    },
    flow::{Engine, FrameContext},
    input::{ButtonInput, KeyInput},
    math::{self, Vec3},
    render::{
        backend::UniformValue,
        pipeline::{MODEL_MATRIX, RenderSettings},
    },
};
use winit::event::MouseButton;

#[derive(Default)]
struct Counter {
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl Behaviour for Counter {
    fn start(&mut self, _ctx: &mut BehaviourContext<'_>) {
        self.log.borrow_mut().push("start");
    }

    fn update(&mut self, _ctx: &mut BehaviourContext<'_>) {
        self.log.borrow_mut().push("update");
    }
}

/// Moves its object one unit along +X per update.
struct Slide;

impl Behaviour for Slide {
    fn update(&mut self, ctx: &mut BehaviourContext<'_>) {
        ctx.transform.translate(Vec3::new(1.0, 0.0, 0.0));
    }
}

fn frame(delta: f32) -> FrameContext {
    FrameContext::new(delta, 0.0, 0)
}

fn camera_scene() -> Scene {
    let mut scene = Scene::new();
    scene.add_object(SceneObject::new("Camera").with_component(Camera::default()));
    scene
}

#[test]
fn start_runs_once_before_the_first_update() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut scene = camera_scene();
    let mut object = SceneObject::new("Counter");
    object.add_component(Component::behaviour(Counter { log: log.clone() }));
    scene.add_object(object);

    let mut engine = Engine::new(scene, test_pipeline(RenderSettings::default()));
    let mut backend = RecordingBackend::new();
    assert!(!engine.is_started());
    engine.run_frame(&frame(0.1), &mut backend).unwrap();
    engine.run_frame(&frame(0.1), &mut backend).unwrap();

    assert!(engine.is_started());
    assert_eq!(*log.borrow(), vec!["start", "update", "update"]);
}

#[test]
fn draws_see_this_frames_updates() {
    let mut scene = camera_scene();
    let mut object = SceneObject::new("Slider")
        .with_component(MeshRenderer::new(Rc::new(Mesh::quad(1.0, Vec3::new(0.0, 0.0, 0.0))), material("Ground")));
    object.add_component(Component::behaviour(Slide));
    scene.add_object(object);

    let mut engine = Engine::new(scene, test_pipeline(RenderSettings::default()));
    let mut backend = RecordingBackend::new();
    let stats = engine.run_frame(&frame(0.1), &mut backend).unwrap();

    assert_eq!(stats.draws, 1);
    let world = engine.scene.find("Slider").unwrap().transform().world_matrix();
    assert_eq!(math::translation_of(&world), Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(backend.last_uniform(MODEL_MATRIX), Some(UniformValue::Mat4(world)));
}

#[test]
fn resize_fits_every_camera() {
    let mut scene = camera_scene();
    scene.add_object(SceneObject::new("Second").with_component(Camera::new(45.0, 1.0, 0.1, 10.0)));
    let mut engine = Engine::new(scene, test_pipeline(RenderSettings::default()));

    engine.resize(800, 400);
    engine.resize(0, 400);

    for (_, camera) in engine.scene.cameras() {
        assert_relative_eq!(camera.aspect(), 2.0);
    }
    assert_eq!(engine.pipeline.settings().width, 800);
    assert_eq!(engine.pipeline.settings().height, 400);
}

fn fly_engine() -> (Engine, Rc<RefCell<reef_ngin::behaviours::FlyInput>>) {
    let fly = FlyController::new(2.0, 0.5);
    let mut engine = Engine::new(camera_scene(), test_pipeline(RenderSettings::default()));
    fly.register(&mut engine.input);
    let input = fly.input();
    if let Some(camera) = engine.scene.find_mut("Camera") {
        camera.add_component(Component::behaviour(fly));
    }
    (engine, input)
}

#[test]
fn fly_controller_moves_along_its_forward() {
    let (mut engine, _) = fly_engine();
    let mut backend = RecordingBackend::new();
    engine.input.dispatch_key(KeyInput {
        key: KeyCode::KeyW,
        pressed: true,
        repeat: false,
    });
    engine.run_frame(&frame(0.5), &mut backend).unwrap();

    let camera = engine.scene.find("Camera").unwrap();
    assert_relative_eq!(camera.transform().position().z, 1.0, epsilon = 1e-5);

    engine.input.dispatch_key(KeyInput {
        key: KeyCode::KeyW,
        pressed: false,
        repeat: false,
    });
    engine.run_frame(&frame(0.5), &mut backend).unwrap();
    let camera = engine.scene.find("Camera").unwrap();
    assert_relative_eq!(camera.transform().position().z, 1.0, epsilon = 1e-5);
}

#[test]
fn fly_controller_moves_in_world_units_under_a_parent() {
    let rig = Transform::new().with_scale(Vec3::new(2.0, 2.0, 2.0));
    let eye = Transform::new();
    eye.set_parent(Some(&rig)).unwrap();

    let mut scene = Scene::new();
    scene.add_object(SceneObject::with_transform("Rig", rig));
    scene.add_object(SceneObject::with_transform("Camera", eye).with_component(Camera::default()));
    let mut engine = Engine::new(scene, test_pipeline(RenderSettings::default()));
    let fly = FlyController::new(2.0, 0.5);
    fly.register(&mut engine.input);
    if let Some(camera) = engine.scene.find_mut("Camera") {
        camera.add_component(Component::behaviour(fly));
    }

    let mut backend = RecordingBackend::new();
    engine.input.dispatch_key(KeyInput {
        key: KeyCode::KeyW,
        pressed: true,
        repeat: false,
    });
    engine.run_frame(&frame(0.5), &mut backend).unwrap();

    let camera = engine.scene.find("Camera").unwrap();
    assert_relative_eq!(camera.transform().world_position().z, 1.0, epsilon = 1e-5);
    assert_relative_eq!(camera.transform().position().z, 0.5, epsilon = 1e-5);
}

#[test]
fn fly_controller_only_looks_while_dragging() {
    let (mut engine, input) = fly_engine();
    let mut backend = RecordingBackend::new();

    engine.input.move_pointer(100.0, 100.0);
    engine.input.move_pointer(140.0, 100.0);
    engine.run_frame(&frame(0.1), &mut backend).unwrap();
    let camera = engine.scene.find("Camera").unwrap();
    assert_relative_eq!(camera.transform().forward(), math::FORWARD, epsilon = 1e-5);

    engine.input.dispatch_button(ButtonInput {
        button: MouseButton::Right,
        pressed: true,
    });
    assert!(input.borrow().looking);
    // 180 pixels at half a degree each
    engine.input.move_pointer(320.0, 100.0);
    engine.run_frame(&frame(0.1), &mut backend).unwrap();
    let camera = engine.scene.find("Camera").unwrap();
    assert_relative_eq!(camera.transform().forward(), math::RIGHT, epsilon = 1e-5);
    assert_eq!(input.borrow().look, (0.0, 0.0));
}
