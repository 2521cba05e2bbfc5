//! GF(2^8) arithmetic over the primitive polynomial x^8+x^4+x^3+x^2+1.

const POLY: u16 = 0x11D;

struct Tables {
    exp: [u8; 512],
    log: [u8; 256],
}

const fn build_tables() -> Tables {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < 255 {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= POLY;
        }
        i += 1;
    }
    while i < 512 {
        exp[i] = exp[i - 255];
        i += 1;
    }
    Tables { exp, log }
}

static TABLES: Tables = build_tables();

#[inline]
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    TABLES.exp[usize::from(TABLES.log[usize::from(a)]) + usize::from(TABLES.log[usize::from(b)])]
}

/// Multiplicative inverse; `inv(0)` is defined as 0.
#[inline]
pub fn inv(a: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    TABLES.exp[255 - usize::from(TABLES.log[usize::from(a)])]
}

/// `dst ^= c * src`, element-wise.
pub fn mul_add(dst: &mut [u8], c: u8, src: &[u8]) {
    if c == 0 {
        return;
    }
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= mul(c, *s);
    }
}

/// `buf *= c`, element-wise.
pub fn scale(buf: &mut [u8], c: u8) {
    for b in buf {
        *b = mul(*b, c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_nonzero_element_has_an_inverse() {
        for a in 1..=255u8 {
            assert_eq!(mul(a, inv(a)), 1, "a={a}");
        }
    }

    #[test]
    fn known_products() {
        assert_eq!(mul(2, 0x80), 0x1D);
        assert_eq!(mul(0, 7), 0);
        assert_eq!(mul(1, 0xAB), 0xAB);
    }
}
