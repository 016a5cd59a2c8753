//! Built-in scenes for the viewer.

use lux_math::{InteractiveCamera, Vec3};

use crate::primitives::Material;
use crate::scene::Scene;

/// Names of the built-in scenes, in cycling order.
pub const DEMO_SCENES: [&str; 3] = ["spheres", "floor_light", "cornell"];

/// Build a built-in scene by name.
pub fn by_name(name: &str, width: i32, height: i32) -> Option<Scene> {
    match name {
        "spheres" => Some(spheres(width, height)),
        "floor_light" => Some(floor_and_light(width, height)),
        "cornell" => Some(cornell_box(width, height)),
        _ => None,
    }
}

/// Two small spheres on a huge floor sphere under a spherical light.
pub fn spheres(width: i32, height: i32) -> Scene {
    let mut scene = Scene::new(width, height).with_name("spheres");
    scene.set_camera(
        InteractiveCamera::new(width, height).with_orbit(Vec3::new(0.0, -0.1, 0.0), 0.0, 0.1, 1.2),
    );

    let floor = Material::new(Vec3::new(0.9, 0.3, 0.0));
    let ivory = Material::new(Vec3::new(0.8, 0.7, 0.6));
    let mirror = ivory.with_surface(0.2, 1.0, 0.0);

    scene.add_sphere(Vec3::new(0.0, -200.4, 0.0), 200.0, &floor);
    scene.add_sphere(Vec3::new(-0.25, -0.24, -0.1), 0.16, &ivory);
    scene.add_sphere(Vec3::new(0.25, -0.24, 0.1), 0.16, &mirror);
    scene.add_sphere(Vec3::new(0.0, 1.36, 0.0), 1.0, &Material::light(Vec3::new(0.9, 0.8, 0.6)));
    scene
}

/// A floor sphere and a single bright emitter.
pub fn floor_and_light(width: i32, height: i32) -> Scene {
    let mut scene = Scene::new(width, height).with_name("floor_light");
    scene.set_camera(InteractiveCamera::new(width, height).with_orbit(Vec3::ZERO, 0.0, 0.2, 4.0));

    scene.add_sphere(Vec3::new(0.0, -201.0, 0.0), 200.0, &Material::new(Vec3::splat(0.8)));
    scene.add_sphere(Vec3::new(0.0, 1.8, 0.0), 1.0, &Material::light(Vec3::splat(10.0)));
    scene
}

/// Classic box with red/green walls, an area light and two spheres.
pub fn cornell_box(width: i32, height: i32) -> Scene {
    let mut scene = Scene::new(width, height).with_name("cornell");
    scene.set_background_color(Vec3::ZERO);
    scene.set_camera(InteractiveCamera::new(width, height).with_orbit(Vec3::ZERO, 0.0, 0.0, 3.2));

    let white = Material::new(Vec3::splat(0.75));
    let red = Material::new(Vec3::new(0.75, 0.15, 0.15));
    let green = Material::new(Vec3::new(0.15, 0.75, 0.15));
    let light = Material::light(Vec3::splat(12.0));

    let (lo, hi) = (-1.0, 1.0);
    let corner = |x: f32, y: f32, z: f32| Vec3::new(x, y, z);

    // floor, ceiling, back wall
    scene.add_plane(corner(lo, lo, lo), corner(hi, lo, lo), corner(lo, lo, hi), corner(hi, lo, hi), &white);
    scene.add_plane(corner(lo, hi, lo), corner(hi, hi, lo), corner(lo, hi, hi), corner(hi, hi, hi), &white);
    scene.add_plane(corner(lo, lo, lo), corner(hi, lo, lo), corner(lo, hi, lo), corner(hi, hi, lo), &white);

    // side walls
    scene.add_plane(corner(lo, lo, lo), corner(lo, hi, lo), corner(lo, lo, hi), corner(lo, hi, hi), &red);
    scene.add_plane(corner(hi, lo, lo), corner(hi, hi, lo), corner(hi, lo, hi), corner(hi, hi, hi), &green);

    // ceiling light, slightly below the ceiling
    let y = hi - 0.001;
    scene.add_plane(
        Vec3::new(-0.3, y, -0.3),
        Vec3::new(0.3, y, -0.3),
        Vec3::new(-0.3, y, 0.3),
        Vec3::new(0.3, y, 0.3),
        &light,
    );

    scene.add_sphere(Vec3::new(-0.45, -0.65, -0.3), 0.35, &white.with_surface(0.0, 1.0, 0.0));
    scene.add_sphere(Vec3::new(0.45, -0.65, 0.3), 0.35, &white.with_surface(0.1, 0.1, 1.0));
    scene
}
