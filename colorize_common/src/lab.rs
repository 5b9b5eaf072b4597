//! sRGB <-> CIE L*a*b* conversion (D65 white point).
//!
//! The colorization networks consume the L channel and predict a*b*, so both
//! directions are needed around every forward pass. Matrices and thresholds
//! match the ones the networks were trained with.

const WHITE_X: f32 = 0.950_47;
const WHITE_Y: f32 = 1.0;
const WHITE_Z: f32 = 1.088_83;

const XYZ_FROM_RGB: [[f32; 3]; 3] = [
    [0.412_453, 0.357_580, 0.180_423],
    [0.212_671, 0.715_160, 0.072_169],
    [0.019_334, 0.119_193, 0.950_227],
];

const RGB_FROM_XYZ: [[f32; 3]; 3] = [
    [3.240_481_3, -1.537_151_5, -0.498_536_3],
    [-0.969_254_9, 1.875_990, 0.041_555_93],
    [0.055_646_64, -0.204_041_34, 1.057_311_1],
];

fn srgb_to_linear(c: f32) -> f32 {
    if c > 0.040_45 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c > 0.003_130_8 {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    } else {
        12.92 * c
    }
}

fn lab_f(t: f32) -> f32 {
    if t > 0.008_856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(t: f32) -> f32 {
    if t > 0.206_893_4 {
        t * t * t
    } else {
        (t - 16.0 / 116.0) / 7.787
    }
}

fn mat_mul(m: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Converts an 8-bit sRGB pixel to `[L, a, b]`, with L in `0..=100`.
pub fn rgb_to_lab(rgb: [u8; 3]) -> [f32; 3] {
    let linear = rgb.map(|c| srgb_to_linear(c as f32 / 255.0));
    let [x, y, z] = mat_mul(&XYZ_FROM_RGB, linear);

    let fx = lab_f(x / WHITE_X);
    let fy = lab_f(y / WHITE_Y);
    let fz = lab_f(z / WHITE_Z);

    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// Luminance only; cheaper than [`rgb_to_lab`] when a*b* are discarded.
pub fn rgb_to_l(rgb: [u8; 3]) -> f32 {
    let linear = rgb.map(|c| srgb_to_linear(c as f32 / 255.0));
    let m = &XYZ_FROM_RGB[1];
    let y = m[0] * linear[0] + m[1] * linear[1] + m[2] * linear[2];
    116.0 * lab_f(y / WHITE_Y) - 16.0
}

/// Converts `[L, a, b]` back to sRGB in `[0, 1]`, clipping out-of-gamut values.
pub fn lab_to_rgb(lab: [f32; 3]) -> [f32; 3] {
    let [l, a, b] = lab;
    let fy = (l + 16.0) / 116.0;
    let fx = a / 500.0 + fy;
    // z must stay non-negative for the inverse transfer function
    let fz = (fy - b / 200.0).max(0.0);

    let xyz = [
        lab_f_inv(fx) * WHITE_X,
        lab_f_inv(fy) * WHITE_Y,
        lab_f_inv(fz) * WHITE_Z,
    ];
    mat_mul(&RGB_FROM_XYZ, xyz).map(|c| linear_to_srgb(c).clamp(0.0, 1.0))
}

/// [`lab_to_rgb`] scaled to the 8-bit display range. Values are truncated.
pub fn lab_to_rgb8(lab: [f32; 3]) -> [u8; 3] {
    lab_to_rgb(lab).map(|c| (c * 255.0) as u8)
}
