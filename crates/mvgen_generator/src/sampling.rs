//! Materialization of viewpoints and lights into concrete values.
//!
//! Shot sequences are lazy: each one owns its own RNG and produces a
//! position only when the generator asks for the next shot.

use std::f32::consts::PI;

use mvgen_core::{Light, Viewpoint, ViewpointKind};
use mvgen_math::{Interval, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::capability::{LightParams, Shots};

/// Uniform random point in the cube `[-range, range]³`.
pub fn random_point<R: Rng + ?Sized>(rng: &mut R, range: f32) -> Vec3 {
    let interval = Interval::symmetric(range);
    Vec3::new(
        interval.lerp(rng.gen()),
        interval.lerp(rng.gen()),
        interval.lerp(rng.gen()),
    )
}

/// Point `(ring, segment)` of a UV sphere centered on the origin.
///
/// Rings sit at polar angle `π (ring + ½) / rings`, segments at azimuth
/// `2π segment / segments`, so no two points coincide at the poles.
pub fn sphere_point(radius: f32, ring: u32, segment: u32, rings: u32, segments: u32) -> Vec3 {
    let theta = PI * (ring as f32 + 0.5) / rings as f32;
    let phi = 2.0 * PI * segment as f32 / segments as f32;
    Vec3::new(
        radius * theta.sin() * phi.cos(),
        radius * theta.sin() * phi.sin(),
        radius * theta.cos(),
    )
}

/// Every point of a UV sphere of the given diameter, ring by ring.
pub fn sphere_path(diameter: f32, horizontal_divisions: u32, vertical_divisions: u32) -> Shots {
    let radius = diameter / 2.0;
    Box::new((0..vertical_divisions).flat_map(move |ring| {
        (0..horizontal_divisions).map(move |segment| {
            sphere_point(radius, ring, segment, vertical_divisions, horizontal_divisions)
        })
    }))
}

/// Camera positions of one viewpoint.
///
/// `preview` forces exactly one position regardless of kind or amount.
pub fn viewpoint_shots(viewpoint: &Viewpoint, preview: bool, mut rng: StdRng) -> Shots {
    let count = if preview {
        1
    } else {
        viewpoint.amount as usize
    };

    match viewpoint.kind {
        ViewpointKind::Static => {
            let location = Vec3::from(viewpoint.location.unwrap_or_default());
            Box::new(std::iter::repeat(location).take(count))
        }
        ViewpointKind::Dynamic => {
            let range = viewpoint.max_range;
            Box::new(std::iter::repeat_with(move || random_point(&mut rng, range)).take(count))
        }
        ViewpointKind::SpherePath if preview => {
            let rings = viewpoint.vertical_divisions.max(1);
            let segments = viewpoint.horizontal_divisions.max(1);
            let first = sphere_point(viewpoint.size / 2.0, 0, 0, rings, segments);
            Box::new(std::iter::once(first))
        }
        ViewpointKind::SpherePath => sphere_path(
            viewpoint.size,
            viewpoint.horizontal_divisions,
            viewpoint.vertical_divisions,
        ),
    }
}

/// Shot sequences for every viewpoint, each with an independent RNG
/// seeded from `rng`.
pub fn materialize_viewpoints<R: Rng + ?Sized>(
    viewpoints: &[Viewpoint],
    preview: bool,
    rng: &mut R,
) -> Vec<Shots> {
    viewpoints
        .iter()
        .map(|viewpoint| viewpoint_shots(viewpoint, preview, StdRng::seed_from_u64(rng.gen())))
        .collect()
}

/// A light resolved for one shot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealizedLight {
    pub location: Vec3,
    pub color: [u8; 3],
    pub energy: f32,
}

impl RealizedLight {
    pub fn params(&self) -> LightParams {
        LightParams::new(self.location, self.color)
    }
}

/// Resolve a light's kind-dependent location, color and energy.
pub fn materialize_light<R: Rng + ?Sized>(light: &Light, rng: &mut R) -> RealizedLight {
    let location = if light.kind.has_fixed_location() {
        Vec3::from(light.location.unwrap_or_default())
    } else {
        random_point(rng, light.max_range)
    };
    let color = if light.kind.has_fixed_color() {
        light.color.unwrap_or([255, 255, 255])
    } else {
        [rng.gen(), rng.gen(), rng.gen()]
    };
    let energy = Interval::new(0.0, light.max_energy).lerp(rng.gen());

    RealizedLight {
        location,
        color,
        energy,
    }
}
