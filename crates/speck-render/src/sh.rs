use glam::{Mat3, Vec3};

// Spherical harmonics constant
pub const SH_C0: f32 = 0.2820947917738781;

/// Highest SH order stored per splat.
pub const MAX_SH_ORDER: u32 = 3;
/// Coefficients per color channel, DC term included.
pub const SH_COEFFS: usize = sh_coeffs_for_degree(MAX_SH_ORDER) as usize;
/// Higher order coefficients per color channel, stored in the SH group.
pub const SH_REST_COEFFS: usize = SH_COEFFS - 1;

pub const fn sh_coeffs_for_degree(degree: u32) -> u32 {
    (degree + 1).pow(2)
}

pub fn channel_to_sh(rgb: f32) -> f32 {
    (rgb - 0.5) / SH_C0
}

pub fn rgb_to_sh(rgb: Vec3) -> Vec3 {
    glam::vec3(
        channel_to_sh(rgb.x),
        channel_to_sh(rgb.y),
        channel_to_sh(rgb.z),
    )
}

/// Real SH basis for orders 0 to 3 evaluated at a unit direction.
///
/// Based on: Efficient Spherical Harmonic Evaluation, Peter-Pike Sloan, JCGT 2013
pub fn sh_basis(dir: Vec3) -> [f32; SH_COEFFS] {
    let Vec3 { x, y, z } = dir;

    let z2 = z * z;
    let fc1 = x * x - y * y;
    let fs1 = 2.0 * x * y;

    let ftmp0a = 0.48860251190292;

    let ftmp0b = -1.092548430592079 * z;
    let ftmp1a = 0.5462742152960395;

    let ftmp0c = -2.285228997322329 * z2 + 0.4570457994644658;
    let ftmp1b = 1.445305721320277 * z;
    let ftmp2a = -0.5900435899266435;
    let fc2 = x * fc1 - y * fs1;
    let fs2 = x * fs1 + y * fc1;

    [
        SH_C0,
        -ftmp0a * y,
        ftmp0a * z,
        -ftmp0a * x,
        ftmp1a * fs1,
        ftmp0b * y,
        0.9461746957575601 * z2 - 0.3153915652525201,
        ftmp0b * x,
        ftmp1a * fc1,
        ftmp2a * fs2,
        ftmp1b * fs1,
        ftmp0c * y,
        z * (1.865881662950577 * z2 - 1.119528997770346),
        ftmp0c * x,
        ftmp1b * fc1,
        ftmp2a * fc2,
    ]
}

/// Evaluate the color of a splat toward `dir`, using bands up to `order`.
///
/// With `sh_only` the base color is replaced by a flat grey so only the view
/// dependent part shows.
pub fn eval_sh(sh: &[Vec3; SH_COEFFS], order: u32, dir: Vec3, sh_only: bool) -> Vec3 {
    let mut color = if sh_only {
        Vec3::splat(0.5)
    } else {
        sh[0] * SH_C0 + 0.5
    };

    let num_coeffs = sh_coeffs_for_degree(order.min(MAX_SH_ORDER)) as usize;
    if num_coeffs > 1 {
        let basis = sh_basis(dir);
        for k in 1..num_coeffs {
            color += sh[k] * basis[k];
        }
    }
    color.max(Vec3::ZERO)
}

const FIT_DIRECTIONS: usize = 32;

fn fit_directions() -> [Vec3; FIT_DIRECTIONS] {
    let golden_angle = std::f32::consts::PI * (3.0 - 5.0f32.sqrt());
    std::array::from_fn(|i| {
        let y = 1.0 - (i as f32 + 0.5) * 2.0 / FIT_DIRECTIONS as f32;
        let r = (1.0 - y * y).max(0.0).sqrt();
        let phi = i as f32 * golden_angle;
        Vec3::new(phi.cos() * r, y, phi.sin() * r)
    })
}

// Solve `lhs * X = rhs` in place with Gauss-Jordan elimination and partial pivoting.
fn solve_in_place<const N: usize>(lhs: &mut [[f64; N]; N], rhs: &mut [[f64; N]; N]) {
    for col in 0..N {
        let pivot = (col..N)
            .max_by(|&a, &b| lhs[a][col].abs().total_cmp(&lhs[b][col].abs()))
            .unwrap_or(col);
        lhs.swap(col, pivot);
        rhs.swap(col, pivot);

        let inv = 1.0 / lhs[col][col];
        for k in 0..N {
            lhs[col][k] *= inv;
            rhs[col][k] *= inv;
        }
        for row in 0..N {
            if row == col {
                continue;
            }
            let f = lhs[row][col];
            if f == 0.0 {
                continue;
            }
            for k in 0..N {
                lhs[row][k] -= f * lhs[col][k];
                rhs[row][k] -= f * rhs[col][k];
            }
        }
    }
}

// Least squares fit of the matrix taking the coefficients of one band to the
// coefficients of the same band after transforming by `rot`.
fn fit_band<const N: usize>(offset: usize, dirs: &[Vec3], rot: Mat3) -> [[f32; N]; N] {
    let inv_rot = rot.transpose();

    let mut ata = [[0.0f64; N]; N];
    let mut atb = [[0.0f64; N]; N];
    for &dir in dirs {
        let a = sh_basis(dir);
        let b = sh_basis(inv_rot * dir);
        for r in 0..N {
            for c in 0..N {
                ata[r][c] += a[offset + r] as f64 * a[offset + c] as f64;
                atb[r][c] += a[offset + r] as f64 * b[offset + c] as f64;
            }
        }
    }
    solve_in_place(&mut ata, &mut atb);
    atb.map(|row| row.map(|v| v as f32))
}

/// Transforms SH coefficients so a splat rotated (or mirrored) by an orthogonal
/// matrix keeps showing the same color along every rotated direction.
///
/// Each band transforms independently of the others, the DC term is left alone.
#[derive(Debug, Clone, PartialEq)]
pub struct ShRotation {
    band1: [[f32; 3]; 3],
    band2: [[f32; 5]; 5],
    band3: [[f32; 7]; 7],
}

impl ShRotation {
    /// Build the band matrices for an orthogonal `rot`. Reflections are supported.
    pub fn from_mat3(rot: Mat3) -> Self {
        let dirs = fit_directions();
        Self {
            band1: fit_band(1, &dirs, rot),
            band2: fit_band(4, &dirs, rot),
            band3: fit_band(9, &dirs, rot),
        }
    }

    pub fn apply(&self, sh: &mut [Vec3; SH_COEFFS]) {
        apply_band(&self.band1, &mut sh[1..4]);
        apply_band(&self.band2, &mut sh[4..9]);
        apply_band(&self.band3, &mut sh[9..16]);
    }
}

fn apply_band<const N: usize>(mat: &[[f32; N]; N], coeffs: &mut [Vec3]) {
    let old: [Vec3; N] = std::array::from_fn(|j| coeffs[j]);
    for (k, out) in coeffs.iter_mut().enumerate() {
        *out = (0..N).map(|j| old[j] * mat[k][j]).sum();
    }
}
