//! LZF decompression, the codec behind PCL's `binary_compressed` payloads.

use crate::error::{PcdError, Result};

/// Decompresses `input` into exactly `expected` bytes.
pub(crate) fn decompress(input: &[u8], expected: usize) -> Result<Vec<u8>> {
    // `expected` comes from the file, so only trust it as far as the input
    // could plausibly expand.
    let mut out = Vec::with_capacity(expected.min(input.len().saturating_mul(8)));
    let mut ip = 0;

    while ip < input.len() {
        let ctrl = input[ip] as usize;
        ip += 1;

        if ctrl < 32 {
            // Literal run of ctrl + 1 bytes.
            let len = ctrl + 1;
            let literal = input
                .get(ip..ip + len)
                .ok_or(PcdError::Lzf("literal run past end of input"))?;
            if out.len() + len > expected {
                return Err(PcdError::Lzf("output larger than declared"));
            }
            out.extend_from_slice(literal);
            ip += len;
        } else {
            // Back reference: 3 bit length, 13 bit distance.
            let mut len = ctrl >> 5;
            if len == 7 {
                len += *input.get(ip).ok_or(PcdError::Lzf("truncated back reference"))? as usize;
                ip += 1;
            }
            len += 2;

            let low = *input.get(ip).ok_or(PcdError::Lzf("truncated back reference"))? as usize;
            ip += 1;
            let distance = ((ctrl & 0x1f) << 8) + low + 1;
            if distance > out.len() {
                return Err(PcdError::Lzf("back reference before start of output"));
            }
            if out.len() + len > expected {
                return Err(PcdError::Lzf("output larger than declared"));
            }

            // Ranges may overlap, so copy byte by byte.
            let start = out.len() - distance;
            for i in 0..len {
                let byte = out[start + i];
                out.push(byte);
            }
        }
    }

    if out.len() != expected {
        return Err(PcdError::Lzf("output shorter than declared"));
    }
    Ok(out)
}

/// Encodes `data` as a sequence of literal runs. Valid LZF, no compression.
#[cfg(test)]
pub(crate) fn literal_stream(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 32 + 1);
    for chunk in data.chunks(32) {
        out.push((chunk.len() - 1) as u8);
        out.extend_from_slice(chunk);
    }
    out
}
