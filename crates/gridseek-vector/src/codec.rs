//! Little-endian blob encoding for index sections.

use gridseek_core::error::{Error, Result};

#[derive(Default)]
pub struct BlobWriter {
    buf: Vec<u8>,
}

impl BlobWriter {
    pub fn new() -> Self { Self::default() }

    pub fn put_u8(&mut self, v: u8) { self.buf.push(v); }
    pub fn put_u32(&mut self, v: u32) { self.buf.extend_from_slice(&v.to_le_bytes()); }
    pub fn put_u64(&mut self, v: u64) { self.buf.extend_from_slice(&v.to_le_bytes()); }
    pub fn put_usize(&mut self, v: usize) { self.put_u64(v as u64); }
    pub fn put_bytes(&mut self, v: &[u8]) { self.buf.extend_from_slice(v); }

    pub fn put_f32s(&mut self, values: &[f32]) {
        self.buf.reserve(values.len() * 4);
        for v in values { self.buf.extend_from_slice(&v.to_le_bytes()); }
    }

    pub fn put_u64s(&mut self, values: &[u64]) {
        for v in values { self.put_u64(*v); }
    }

    /// Length-prefixed list of slots.
    pub fn put_slots(&mut self, slots: &[u32]) {
        self.put_u32(slots.len() as u32);
        for s in slots { self.put_u32(*s); }
    }

    pub fn finish(self) -> Vec<u8> { self.buf }
}

pub struct BlobReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BlobReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self { Self { buf, pos: 0 } }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.buf.len()).ok_or_else(|| {
            Error::IncompatibleIndex(format!("index blob truncated at byte {} (wanted {} more)", self.pos, n))
        })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Result<u8> { Ok(self.take(1)?[0]) }
    pub fn get_u32(&mut self) -> Result<u32> { Ok(u32::from_le_bytes(self.array()?)) }
    pub fn get_u64(&mut self) -> Result<u64> { Ok(u64::from_le_bytes(self.array()?)) }
    pub fn get_usize(&mut self) -> Result<usize> { Ok(self.get_u64()? as usize) }
    pub fn get_bytes(&mut self, n: usize) -> Result<&'a [u8]> { self.take(n) }

    pub fn get_f32s(&mut self, n: usize) -> Result<Vec<f32>> {
        let bytes = self.take(n.checked_mul(4).ok_or_else(|| Error::IncompatibleIndex("vector section too large".into()))?)?;
        Ok(bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect())
    }

    pub fn get_u64s(&mut self, n: usize) -> Result<Vec<u64>> {
        let bytes = self.take(n.checked_mul(8).ok_or_else(|| Error::IncompatibleIndex("id section too large".into()))?)?;
        Ok(bytes.chunks_exact(8).map(|c| {
            let mut a = [0u8; 8];
            a.copy_from_slice(c);
            u64::from_le_bytes(a)
        }).collect())
    }

    pub fn get_slots(&mut self) -> Result<Vec<u32>> {
        let n = self.get_u32()? as usize;
        let bytes = self.take(n * 4)?;
        Ok(bytes.chunks_exact(4).map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect())
    }

    pub fn is_exhausted(&self) -> bool { self.pos == self.buf.len() }
}
