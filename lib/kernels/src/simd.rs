// SIMD kernels for f32 vectors stored as raw little-endian byte buffers.
// Buffers come straight out of index storage or host blobs, so no alignment
// is assumed: wide loads use the unaligned variants and scalar tails go
// through read_unaligned.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

#[inline(always)]
fn f32_len(bytes: &[u8]) -> usize {
    bytes.len() / 4
}

#[inline(always)]
unsafe fn load_f32(bytes: &[u8], i: usize) -> f32 {
    (bytes.as_ptr() as *const f32).add(i).read_unaligned()
}

// ---------------------------------------------------------------------------
// Scalar fallbacks (two accumulators for better pipelining)
// ---------------------------------------------------------------------------

pub(crate) fn dot_f32_scalar(a: &[u8], b: &[u8]) -> f32 {
    let dim = f32_len(a);
    let mut dot0 = 0.0f32;
    let mut dot1 = 0.0f32;

    let mut i = 0;
    while i + 1 < dim {
        unsafe {
            dot0 += load_f32(a, i) * load_f32(b, i);
            dot1 += load_f32(a, i + 1) * load_f32(b, i + 1);
        }
        i += 2;
    }
    if i < dim {
        dot0 += unsafe { load_f32(a, i) * load_f32(b, i) };
    }

    dot0 + dot1
}

pub(crate) fn sqeuclidean_f32_scalar(a: &[u8], b: &[u8]) -> f32 {
    let dim = f32_len(a);
    let mut sum0 = 0.0f32;
    let mut sum1 = 0.0f32;

    let mut i = 0;
    while i + 1 < dim {
        unsafe {
            let d0 = load_f32(a, i) - load_f32(b, i);
            let d1 = load_f32(a, i + 1) - load_f32(b, i + 1);
            sum0 += d0 * d0;
            sum1 += d1 * d1;
        }
        i += 2;
    }
    if i < dim {
        let d = unsafe { load_f32(a, i) - load_f32(b, i) };
        sum0 += d * d;
    }

    sum0 + sum1
}

pub(crate) fn cosine_f32_scalar(a: &[u8], b: &[u8]) -> f32 {
    let dim = f32_len(a);
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;

    for i in 0..dim {
        unsafe {
            let x = load_f32(a, i);
            let y = load_f32(b, i);
            dot += x * y;
            na += x * x;
            nb += y * y;
        }
    }

    crate::cosine_from_parts(dot, na, nb)
}

// ---------------------------------------------------------------------------
// AVX2 + FMA (16 floats per iteration, two registers)
// ---------------------------------------------------------------------------

#[cfg(target_arch = "x86_64")]
pub(crate) fn dot_f32_avx2(a: &[u8], b: &[u8]) -> f32 {
    unsafe { dot_f32_avx2_impl(a, b) }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn dot_f32_avx2_impl(a: &[u8], b: &[u8]) -> f32 {
    let dim = f32_len(a);
    let pa = a.as_ptr() as *const f32;
    let pb = b.as_ptr() as *const f32;
    let mut i = 0;

    let mut sum1 = _mm256_setzero_ps();
    let mut sum2 = _mm256_setzero_ps();

    while i + 15 < dim {
        let vx1 = _mm256_loadu_ps(pa.add(i));
        let vy1 = _mm256_loadu_ps(pb.add(i));
        let vx2 = _mm256_loadu_ps(pa.add(i + 8));
        let vy2 = _mm256_loadu_ps(pb.add(i + 8));

        sum1 = _mm256_fmadd_ps(vx1, vy1, sum1);
        sum2 = _mm256_fmadd_ps(vx2, vy2, sum2);

        i += 16;
    }

    let mut dot = hsum256(_mm256_add_ps(sum1, sum2));

    while i < dim {
        dot += load_f32(a, i) * load_f32(b, i);
        i += 1;
    }

    dot
}

#[cfg(target_arch = "x86_64")]
pub(crate) fn sqeuclidean_f32_avx2(a: &[u8], b: &[u8]) -> f32 {
    unsafe { sqeuclidean_f32_avx2_impl(a, b) }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn sqeuclidean_f32_avx2_impl(a: &[u8], b: &[u8]) -> f32 {
    let dim = f32_len(a);
    let pa = a.as_ptr() as *const f32;
    let pb = b.as_ptr() as *const f32;
    let mut i = 0;

    let mut sum1 = _mm256_setzero_ps();
    let mut sum2 = _mm256_setzero_ps();

    while i + 15 < dim {
        let va1 = _mm256_loadu_ps(pa.add(i));
        let vb1 = _mm256_loadu_ps(pb.add(i));
        let va2 = _mm256_loadu_ps(pa.add(i + 8));
        let vb2 = _mm256_loadu_ps(pb.add(i + 8));

        let diff1 = _mm256_sub_ps(va1, vb1);
        let diff2 = _mm256_sub_ps(va2, vb2);

        sum1 = _mm256_fmadd_ps(diff1, diff1, sum1);
        sum2 = _mm256_fmadd_ps(diff2, diff2, sum2);

        i += 16;
    }

    let mut sum_sq = hsum256(_mm256_add_ps(sum1, sum2));

    while i < dim {
        let diff = load_f32(a, i) - load_f32(b, i);
        sum_sq += diff * diff;
        i += 1;
    }

    sum_sq
}

#[cfg(target_arch = "x86_64")]
pub(crate) fn cosine_f32_avx2(a: &[u8], b: &[u8]) -> f32 {
    unsafe { cosine_f32_avx2_impl(a, b) }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn cosine_f32_avx2_impl(a: &[u8], b: &[u8]) -> f32 {
    let dim = f32_len(a);
    let pa = a.as_ptr() as *const f32;
    let pb = b.as_ptr() as *const f32;
    let mut i = 0;

    let mut dots = _mm256_setzero_ps();
    let mut nas = _mm256_setzero_ps();
    let mut nbs = _mm256_setzero_ps();

    while i + 7 < dim {
        let va = _mm256_loadu_ps(pa.add(i));
        let vb = _mm256_loadu_ps(pb.add(i));

        dots = _mm256_fmadd_ps(va, vb, dots);
        nas = _mm256_fmadd_ps(va, va, nas);
        nbs = _mm256_fmadd_ps(vb, vb, nbs);

        i += 8;
    }

    let mut dot = hsum256(dots);
    let mut na = hsum256(nas);
    let mut nb = hsum256(nbs);

    while i < dim {
        let x = load_f32(a, i);
        let y = load_f32(b, i);
        dot += x * y;
        na += x * x;
        nb += y * y;
        i += 1;
    }

    crate::cosine_from_parts(dot, na, nb)
}

// Horizontal sum of the 8 lanes of a 256-bit register
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn hsum256(v: __m256) -> f32 {
    let sum_high = _mm256_extractf128_ps(v, 1);
    let sum_low = _mm256_castps256_ps128(v);
    let mut sum_128 = _mm_add_ps(sum_high, sum_low);

    sum_128 = _mm_hadd_ps(sum_128, sum_128);
    sum_128 = _mm_hadd_ps(sum_128, sum_128);

    _mm_cvtss_f32(sum_128)
}

// ---------------------------------------------------------------------------
// SSE (4 floats per iteration)
// ---------------------------------------------------------------------------

#[cfg(target_arch = "x86_64")]
pub(crate) fn dot_f32_sse(a: &[u8], b: &[u8]) -> f32 {
    unsafe { dot_f32_sse_impl(a, b) }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse")]
unsafe fn dot_f32_sse_impl(a: &[u8], b: &[u8]) -> f32 {
    let dim = f32_len(a);
    let pa = a.as_ptr() as *const f32;
    let pb = b.as_ptr() as *const f32;
    let mut i = 0;
    let mut sum = _mm_setzero_ps();

    while i + 3 < dim {
        let va = _mm_loadu_ps(pa.add(i));
        let vb = _mm_loadu_ps(pb.add(i));
        sum = _mm_add_ps(sum, _mm_mul_ps(va, vb));
        i += 4;
    }

    let mut dot = hsum128(sum);

    while i < dim {
        dot += load_f32(a, i) * load_f32(b, i);
        i += 1;
    }

    dot
}

#[cfg(target_arch = "x86_64")]
pub(crate) fn sqeuclidean_f32_sse(a: &[u8], b: &[u8]) -> f32 {
    unsafe { sqeuclidean_f32_sse_impl(a, b) }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse")]
unsafe fn sqeuclidean_f32_sse_impl(a: &[u8], b: &[u8]) -> f32 {
    let dim = f32_len(a);
    let pa = a.as_ptr() as *const f32;
    let pb = b.as_ptr() as *const f32;
    let mut i = 0;
    let mut sum = _mm_setzero_ps();

    while i + 3 < dim {
        let va = _mm_loadu_ps(pa.add(i));
        let vb = _mm_loadu_ps(pb.add(i));
        let diff = _mm_sub_ps(va, vb);
        sum = _mm_add_ps(sum, _mm_mul_ps(diff, diff));
        i += 4;
    }

    let mut sum_sq = hsum128(sum);

    while i < dim {
        let diff = load_f32(a, i) - load_f32(b, i);
        sum_sq += diff * diff;
        i += 1;
    }

    sum_sq
}

#[cfg(target_arch = "x86_64")]
pub(crate) fn cosine_f32_sse(a: &[u8], b: &[u8]) -> f32 {
    unsafe { cosine_f32_sse_impl(a, b) }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse")]
unsafe fn cosine_f32_sse_impl(a: &[u8], b: &[u8]) -> f32 {
    let dim = f32_len(a);
    let pa = a.as_ptr() as *const f32;
    let pb = b.as_ptr() as *const f32;
    let mut i = 0;

    let mut dots = _mm_setzero_ps();
    let mut nas = _mm_setzero_ps();
    let mut nbs = _mm_setzero_ps();

    while i + 3 < dim {
        let va = _mm_loadu_ps(pa.add(i));
        let vb = _mm_loadu_ps(pb.add(i));
        dots = _mm_add_ps(dots, _mm_mul_ps(va, vb));
        nas = _mm_add_ps(nas, _mm_mul_ps(va, va));
        nbs = _mm_add_ps(nbs, _mm_mul_ps(vb, vb));
        i += 4;
    }

    let mut dot = hsum128(dots);
    let mut na = hsum128(nas);
    let mut nb = hsum128(nbs);

    while i < dim {
        let x = load_f32(a, i);
        let y = load_f32(b, i);
        dot += x * y;
        na += x * x;
        nb += y * y;
        i += 1;
    }

    crate::cosine_from_parts(dot, na, nb)
}

// Horizontal sum of the 4 lanes of a 128-bit register
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse")]
unsafe fn hsum128(v: __m128) -> f32 {
    let shuf = _mm_shuffle_ps(v, v, 0b10_11_00_01);
    let sum = _mm_add_ps(v, shuf);
    let shuf = _mm_movehl_ps(sum, sum);
    let sum = _mm_add_ss(sum, shuf);
    _mm_cvtss_f32(sum)
}

// ---------------------------------------------------------------------------
// NEON (8 floats per iteration, two registers)
// ---------------------------------------------------------------------------

#[cfg(target_arch = "aarch64")]
pub(crate) fn dot_f32_neon(a: &[u8], b: &[u8]) -> f32 {
    unsafe { dot_f32_neon_impl(a, b) }
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn dot_f32_neon_impl(a: &[u8], b: &[u8]) -> f32 {
    let dim = f32_len(a);
    let pa = a.as_ptr() as *const f32;
    let pb = b.as_ptr() as *const f32;
    let mut i = 0;

    let mut sum1 = vdupq_n_f32(0.0);
    let mut sum2 = vdupq_n_f32(0.0);

    while i + 7 < dim {
        let va1 = vld1q_f32(pa.add(i));
        let vb1 = vld1q_f32(pb.add(i));
        let va2 = vld1q_f32(pa.add(i + 4));
        let vb2 = vld1q_f32(pb.add(i + 4));

        sum1 = vfmaq_f32(sum1, va1, vb1);
        sum2 = vfmaq_f32(sum2, va2, vb2);

        i += 8;
    }

    while i + 3 < dim {
        let va = vld1q_f32(pa.add(i));
        let vb = vld1q_f32(pb.add(i));
        sum1 = vfmaq_f32(sum1, va, vb);
        i += 4;
    }

    let mut dot = vaddvq_f32(vaddq_f32(sum1, sum2));

    while i < dim {
        dot += load_f32(a, i) * load_f32(b, i);
        i += 1;
    }

    dot
}

#[cfg(target_arch = "aarch64")]
pub(crate) fn sqeuclidean_f32_neon(a: &[u8], b: &[u8]) -> f32 {
    unsafe { sqeuclidean_f32_neon_impl(a, b) }
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn sqeuclidean_f32_neon_impl(a: &[u8], b: &[u8]) -> f32 {
    let dim = f32_len(a);
    let pa = a.as_ptr() as *const f32;
    let pb = b.as_ptr() as *const f32;
    let mut i = 0;

    let mut sum1 = vdupq_n_f32(0.0);
    let mut sum2 = vdupq_n_f32(0.0);

    while i + 7 < dim {
        let va1 = vld1q_f32(pa.add(i));
        let vb1 = vld1q_f32(pb.add(i));
        let va2 = vld1q_f32(pa.add(i + 4));
        let vb2 = vld1q_f32(pb.add(i + 4));

        let diff1 = vsubq_f32(va1, vb1);
        let diff2 = vsubq_f32(va2, vb2);

        sum1 = vfmaq_f32(sum1, diff1, diff1);
        sum2 = vfmaq_f32(sum2, diff2, diff2);

        i += 8;
    }

    while i + 3 < dim {
        let va = vld1q_f32(pa.add(i));
        let vb = vld1q_f32(pb.add(i));
        let diff = vsubq_f32(va, vb);
        sum1 = vfmaq_f32(sum1, diff, diff);
        i += 4;
    }

    let mut sum_sq = vaddvq_f32(vaddq_f32(sum1, sum2));

    while i < dim {
        let diff = load_f32(a, i) - load_f32(b, i);
        sum_sq += diff * diff;
        i += 1;
    }

    sum_sq
}

#[cfg(target_arch = "aarch64")]
pub(crate) fn cosine_f32_neon(a: &[u8], b: &[u8]) -> f32 {
    unsafe { cosine_f32_neon_impl(a, b) }
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn cosine_f32_neon_impl(a: &[u8], b: &[u8]) -> f32 {
    let dim = f32_len(a);
    let pa = a.as_ptr() as *const f32;
    let pb = b.as_ptr() as *const f32;
    let mut i = 0;

    let mut dots = vdupq_n_f32(0.0);
    let mut nas = vdupq_n_f32(0.0);
    let mut nbs = vdupq_n_f32(0.0);

    while i + 3 < dim {
        let va = vld1q_f32(pa.add(i));
        let vb = vld1q_f32(pb.add(i));
        dots = vfmaq_f32(dots, va, vb);
        nas = vfmaq_f32(nas, va, va);
        nbs = vfmaq_f32(nbs, vb, vb);
        i += 4;
    }

    let mut dot = vaddvq_f32(dots);
    let mut na = vaddvq_f32(nas);
    let mut nb = vaddvq_f32(nbs);

    while i < dim {
        let x = load_f32(a, i);
        let y = load_f32(b, i);
        dot += x * y;
        na += x * x;
        nb += y * y;
        i += 1;
    }

    crate::cosine_from_parts(dot, na, nb)
}
