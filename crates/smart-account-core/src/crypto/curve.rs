//! secp256k1 ECDSA verification against explicit public key coordinates
//!
//! Arithmetic is done in Jacobian coordinates over 256-bit integers so that
//! a verification needs a single field inversion. The group law uses the
//! short Weierstrass form `y^2 = x^3 + 7` (a = 0).

use alloy_primitives::{B256, U256, uint};

/// Field prime
pub const P: U256 =
    uint!(0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFC2F_U256);

/// Group order
pub const N: U256 =
    uint!(0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141_U256);

/// Generator x coordinate
pub const GX: U256 =
    uint!(0x79BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798_U256);

/// Generator y coordinate
pub const GY: U256 =
    uint!(0x483ADA7726A3C4655DA4FBFC0E1108A8FD17B448A68554199C47D08FFB10D4B8_U256);

const B: U256 = uint!(7_U256);

#[inline]
fn add(a: U256, b: U256) -> U256 {
    a.add_mod(b, P)
}

#[inline]
fn sub(a: U256, b: U256) -> U256 {
    a.add_mod(P - b, P)
}

#[inline]
fn mul(a: U256, b: U256) -> U256 {
    a.mul_mod(b, P)
}

#[inline]
fn square(a: U256) -> U256 {
    a.mul_mod(a, P)
}

/// Modular inverse by Fermat's little theorem (modulus must be prime)
#[inline]
fn invert(a: U256, modulus: U256) -> U256 {
    a.pow_mod(modulus - U256::from(2u8), modulus)
}

/// Point in Jacobian coordinates, `(X / Z^2, Y / Z^3)` in affine form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JacobianPoint {
    x: U256,
    y: U256,
    z: U256,
}

impl JacobianPoint {
    const INFINITY: Self = Self {
        x: U256::ZERO,
        y: U256::ZERO,
        z: U256::ZERO,
    };

    fn from_affine(x: U256, y: U256) -> Self {
        Self {
            x,
            y,
            z: U256::from(1u8),
        }
    }

    fn is_infinity(&self) -> bool {
        self.z.is_zero()
    }

    fn double(&self) -> Self {
        if self.is_infinity() || self.y.is_zero() {
            return Self::INFINITY;
        }

        let a = square(self.x);
        let b = square(self.y);
        let c = square(b);
        let t = sub(sub(square(add(self.x, b)), a), c);
        let d = add(t, t);
        let e = add(add(a, a), a);
        let f = square(e);

        let x3 = sub(f, add(d, d));
        let c8 = mul(c, U256::from(8u8));
        let y3 = sub(mul(e, sub(d, x3)), c8);
        let yz = mul(self.y, self.z);
        let z3 = add(yz, yz);

        Self {
            x: x3,
            y: y3,
            z: z3,
        }
    }

    fn add(&self, other: &Self) -> Self {
        if self.is_infinity() {
            return *other;
        }
        if other.is_infinity() {
            return *self;
        }

        let z1z1 = square(self.z);
        let z2z2 = square(other.z);
        let u1 = mul(self.x, z2z2);
        let u2 = mul(other.x, z1z1);
        let s1 = mul(self.y, mul(other.z, z2z2));
        let s2 = mul(other.y, mul(self.z, z1z1));

        if u1 == u2 {
            if s1 != s2 {
                return Self::INFINITY;
            }
            return self.double();
        }

        let h = sub(u2, u1);
        let r = sub(s2, s1);
        let hh = square(h);
        let hhh = mul(h, hh);
        let u1hh = mul(u1, hh);

        let x3 = sub(sub(square(r), hhh), add(u1hh, u1hh));
        let y3 = sub(mul(r, sub(u1hh, x3)), mul(s1, hhh));
        let z3 = mul(h, mul(self.z, other.z));

        Self {
            x: x3,
            y: y3,
            z: z3,
        }
    }

    /// Affine coordinates, `None` for the point at infinity
    fn to_affine(&self) -> Option<(U256, U256)> {
        if self.is_infinity() {
            return None;
        }
        let z_inv = invert(self.z, P);
        let z_inv2 = square(z_inv);
        Some((mul(self.x, z_inv2), mul(self.y, mul(z_inv, z_inv2))))
    }
}

/// Compute `u1 * G + u2 * Q` with a shared double-and-add pass
fn shamir_mul(u1: U256, u2: U256, q: &JacobianPoint) -> JacobianPoint {
    let g = JacobianPoint::from_affine(GX, GY);
    let gq = g.add(q);

    let mut acc = JacobianPoint::INFINITY;
    for i in (0..256).rev() {
        acc = acc.double();
        match (u1.bit(i), u2.bit(i)) {
            (true, true) => acc = acc.add(&gq),
            (true, false) => acc = acc.add(&g),
            (false, true) => acc = acc.add(q),
            (false, false) => {}
        }
    }
    acc
}

/// Check that `(x, y)` is a point on secp256k1
///
/// Coordinates must be reduced below the field prime.
pub fn is_on_curve(x: U256, y: U256) -> bool {
    if x >= P || y >= P {
        return false;
    }
    let rhs = add(mul(square(x), x), B);
    square(y) == rhs
}

/// Scalar multiple of the generator in affine form
pub fn mul_generator(k: U256) -> Option<(U256, U256)> {
    shamir_mul(k.reduce_mod(N), U256::ZERO, &JacobianPoint::INFINITY).to_affine()
}

/// Verify an ECDSA signature over a 32-byte hash
///
/// Returns `false` for any out-of-range input instead of failing, so callers
/// can treat the result as a plain yes/no answer.
pub fn verify(hash: &B256, r: &B256, s: &B256, qx: &B256, qy: &B256) -> bool {
    let r = U256::from_be_bytes(r.0);
    let s = U256::from_be_bytes(s.0);
    if r.is_zero() || r >= N || s.is_zero() || s >= N {
        return false;
    }

    let qx = U256::from_be_bytes(qx.0);
    let qy = U256::from_be_bytes(qy.0);
    if !is_on_curve(qx, qy) {
        return false;
    }

    let z = U256::from_be_bytes(hash.0).reduce_mod(N);
    let w = invert(s, N);
    let u1 = z.mul_mod(w, N);
    let u2 = r.mul_mod(w, N);

    let q = JacobianPoint::from_affine(qx, qy);
    match shamir_mul(u1, u2, &q).to_affine() {
        Some((x, _)) => x.reduce_mod(N) == r,
        None => false,
    }
}
