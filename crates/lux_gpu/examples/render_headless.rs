//! Example: Progressively render a small scene on the GPU without a window.
//!
//! Run with: cargo run -p lux_gpu --example render_headless -- out.png 16

use std::env;
use std::sync::Arc;

use anyhow::Result;
use lux_core::{Camera, Light, Material, Mesh, Node, Scene, Transform};
use lux_gpu::{GpuContext, GpuPathTracingProgram};
use lux_math::Vec3;
use lux_renderer::{PathTracingRenderer, ProgramInputs, RendererSettings};
use lux_scene::{GenerateOptions, SceneEncoder};

fn cube() -> Mesh {
    let positions = vec![
        Vec3::new(-0.5, -0.5, 0.5),
        Vec3::new(0.5, -0.5, 0.5),
        Vec3::new(0.5, 0.5, 0.5),
        Vec3::new(-0.5, 0.5, 0.5),
        Vec3::new(-0.5, -0.5, -0.5),
        Vec3::new(0.5, -0.5, -0.5),
        Vec3::new(0.5, 0.5, -0.5),
        Vec3::new(-0.5, 0.5, -0.5),
    ];
    let indices = vec![
        0, 1, 2, 0, 2, 3, // front
        5, 4, 7, 5, 7, 6, // back
        3, 2, 6, 3, 6, 7, // top
        4, 5, 1, 4, 1, 0, // bottom
        1, 5, 6, 1, 6, 2, // right
        4, 0, 3, 4, 3, 7, // left
    ];
    let mut mesh = Mesh::new(positions, indices, None);
    mesh.compute_normals();
    mesh
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let output = args.get(1).map(String::as_str).unwrap_or("render.png");
    let samples: u32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(8);
    let (width, height) = (320, 240);

    let mut scene = Scene::new("headless");
    scene.add_root(Node::mesh(
        "cube",
        Arc::new(cube()),
        Arc::new(Material::new("red", Vec3::new(0.8, 0.1, 0.1))),
    ));
    scene.add_root(
        Node::light("sun", Light::directional(Vec3::ONE, 3.0))
            .with_transform(Transform::from_translation(Vec3::new(2.0, 4.0, 3.0))),
    );
    println!("Scene '{}': {} triangles", scene.name, scene.total_triangle_count());

    let generated = SceneEncoder::new().generate(&scene, &GenerateOptions::default())?;
    let mut inputs = ProgramInputs::new();
    inputs.update_from(&generated, None)?;

    let context = GpuContext::new_blocking()?;
    println!("Adapter: {}", context.adapter_info.name);
    let program = GpuPathTracingProgram::reference(context)?;

    let mut renderer = PathTracingRenderer::new(program, RendererSettings::default().with_tiles(2, 2));
    renderer.set_size(width, height)?;
    let camera = Camera::new(Vec3::new(2.0, 1.5, 3.0), Vec3::ZERO, width as f32 / height as f32);

    while renderer.samples() < samples as f32 {
        renderer.update(&camera, &inputs)?;
    }
    println!("Rendered {} samples", renderer.samples());

    if let Some(target) = renderer.target() {
        image::DynamicImage::ImageRgba32F(target.to_image()).to_rgba8().save(output)?;
        println!("Wrote {}", output);
    }
    renderer.dispose();
    Ok(())
}
