//! W^X code/data regions (spec.md §4.4). Two separately-permissioned
//! `region`-backed allocations: the data region never leaves R+W, the code
//! region starts R+W and transitions exactly once to R+X in
//! [`JitMemoryRegion::make_executable`].

use std::ffi::c_void;

use fasterbasic_jit_backend::{encode_add_sub_imm, encode_adr, encode_b};

use crate::error::JitError;

extern "C" {
    // Provided by libgcc/compiler-rt on every platform that needs it;
    // a no-op on architectures with a unified instruction/data cache.
    fn __clear_cache(start: *mut c_void, end: *mut c_void);
}

fn round_up_to_page(n: usize) -> usize {
    let page = region::page::size();
    n.max(1).div_ceil(page) * page
}

pub struct JitMemoryRegion {
    code: region::Allocation,
    code_len: usize,
    data: region::Allocation,
    data_len: usize,
    executable: bool,
}

impl JitMemoryRegion {
    pub fn allocate(code_capacity: usize, data_capacity: usize) -> Result<JitMemoryRegion, JitError> {
        let code_pages = round_up_to_page(code_capacity);
        let data_pages = round_up_to_page(data_capacity);
        let code = region::alloc(code_pages, region::Protection::READ_WRITE).map_err(|e| JitError::Allocate(code_pages, e))?;
        let data = region::alloc(data_pages, region::Protection::READ_WRITE).map_err(|e| JitError::Allocate(data_pages, e))?;
        Ok(JitMemoryRegion { code, code_len: 0, data, data_len: 0, executable: false })
    }

    pub fn code_capacity(&self) -> usize {
        self.code.len()
    }

    pub fn data_capacity(&self) -> usize {
        self.data.len()
    }

    pub fn code_len(&self) -> usize {
        self.code_len
    }

    pub fn code_base_addr(&self) -> u64 {
        self.code.as_ptr::<u8>() as u64
    }

    pub fn data_base_addr(&self) -> u64 {
        self.data.as_ptr::<u8>() as u64
    }

    pub fn is_executable(&self) -> bool {
        self.executable
    }

    /// Appends `bytes` to the code region and returns the offset it landed
    /// at. Refuses once [`Self::make_executable`] has run.
    pub fn write_code(&mut self, bytes: &[u8]) -> Result<u32, JitError> {
        if self.executable {
            return Err(JitError::NotWritable);
        }
        if self.code_len + bytes.len() > self.code.len() {
            return Err(JitError::Overflow { offset: self.code_len, len: bytes.len(), capacity: self.code.len() });
        }
        let offset = self.code_len;
        unsafe {
            let dst = (self.code.as_mut_ptr::<u8>()).add(offset);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }
        self.code_len += bytes.len();
        Ok(offset as u32)
    }

    pub fn write_data(&mut self, bytes: &[u8]) -> Result<u32, JitError> {
        if self.data_len + bytes.len() > self.data.len() {
            return Err(JitError::Overflow { offset: self.data_len, len: bytes.len(), capacity: self.data.len() });
        }
        let offset = self.data_len;
        unsafe {
            let dst = (self.data.as_mut_ptr::<u8>()).add(offset);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }
        self.data_len += bytes.len();
        Ok(offset as u32)
    }

    /// Overwrites already-written bytes in the data region (used by the
    /// linker to fill in a `DATA_SYMREF` slot). The data region is never
    /// subject to the code region's W^X transition, so this is always
    /// legal regardless of `make_executable` state.
    pub fn patch_data(&mut self, offset: u32, bytes: &[u8]) -> Result<(), JitError> {
        if offset as usize + bytes.len() > self.data.len() {
            return Err(JitError::Overflow { offset: offset as usize, len: bytes.len(), capacity: self.data.len() });
        }
        unsafe {
            let dst = (self.data.as_mut_ptr::<u8>()).add(offset as usize);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }
        Ok(())
    }

    fn read_code_word(&self, offset: u32) -> u32 {
        let mut buf = [0u8; 4];
        unsafe {
            let src = (self.code.as_ptr::<u8>()).add(offset as usize);
            std::ptr::copy_nonoverlapping(src, buf.as_mut_ptr(), 4);
        }
        u32::from_le_bytes(buf)
    }

    fn patch_code_word(&mut self, offset: u32, word: u32) -> Result<(), JitError> {
        if self.executable {
            return Err(JitError::NotWritable);
        }
        let bytes = word.to_le_bytes();
        unsafe {
            let dst = (self.code.as_mut_ptr::<u8>()).add(offset as usize);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, 4);
        }
        Ok(())
    }

    /// Appends `LDR X16,[PC,#8]; BR X16; .quad target_addr` and returns its
    /// offset in the code region (spec.md §4.4).
    pub fn write_trampoline(&mut self, target_addr: u64) -> Result<u32, JitError> {
        const LDR_X16_PC_8: u32 = 0x5800_0050; // LDR X16, literal +2 words
        const BR_X16: u32 = 0xD61F_0200;
        let mut buf = Vec::with_capacity(16);
        buf.extend_from_slice(&LDR_X16_PC_8.to_le_bytes());
        buf.extend_from_slice(&BR_X16.to_le_bytes());
        buf.extend_from_slice(&target_addr.to_le_bytes());
        self.write_code(&buf)
    }

    /// Appends a pair of BRK words followed by a sentinel quad, so an
    /// unresolved external call traps instead of jumping to address 0.
    pub fn write_trap_stub(&mut self) -> Result<u32, JitError> {
        const BRK_0: u32 = 0xD420_0000;
        const TRAP_SENTINEL: u64 = 0xDEAD_C0DE_DEAD_C0DE;
        let mut buf = Vec::with_capacity(16);
        buf.extend_from_slice(&BRK_0.to_le_bytes());
        buf.extend_from_slice(&BRK_0.to_le_bytes());
        buf.extend_from_slice(&TRAP_SENTINEL.to_le_bytes());
        self.write_code(&buf)
    }

    /// Patches an ADRP+ADD pair (emitted at `adrp_offset`/`adrp_offset+4`)
    /// so it materializes `target_addr` (spec.md §4.4).
    pub fn patch_adrp_add(&mut self, adrp_offset: u32, target_addr: u64) -> Result<(), JitError> {
        let adrp_word = self.read_code_word(adrp_offset);
        let add_word = self.read_code_word(adrp_offset + 4);
        let rd = (adrp_word & 0x1f) as u8;
        let add_rd = (add_word & 0x1f) as u8;
        let add_rn = ((add_word >> 5) & 0x1f) as u8;

        let adrp_runtime_addr = self.code_base_addr() + adrp_offset as u64;
        let delta_pages = (target_addr >> 12) as i64 - (adrp_runtime_addr >> 12) as i64;
        let new_adrp = encode_adr(true, rd, delta_pages).map_err(|_| JitError::Overflow {
            offset: adrp_offset as usize,
            len: 4,
            capacity: self.code.len(),
        })?;
        let imm12 = (target_addr & 0xfff) as u32;
        let new_add = encode_add_sub_imm(true, false, false, add_rd, add_rn, imm12, false).map_err(|_| {
            JitError::Overflow { offset: adrp_offset as usize + 4, len: 4, capacity: self.code.len() }
        })?;

        self.patch_code_word(adrp_offset, new_adrp)?;
        self.patch_code_word(adrp_offset + 4, new_add)?;
        Ok(())
    }

    /// Patches a placeholder `BL` at `bl_offset` to branch to `stub_offset`.
    pub fn patch_bl_to_trampoline(&mut self, bl_offset: u32, stub_offset: u32) -> Result<(), JitError> {
        let delta_words = (stub_offset as i64 - bl_offset as i64) / 4;
        let word = encode_b(true, delta_words).map_err(|_| JitError::Overflow {
            offset: bl_offset as usize,
            len: 4,
            capacity: self.code.len(),
        })?;
        self.patch_code_word(bl_offset, word)
    }

    /// Flips the code region to R+X, flushes the instruction cache, and
    /// marks the region immutable. Idempotent.
    pub fn make_executable(&mut self) -> Result<(), JitError> {
        if self.executable {
            return Ok(());
        }
        unsafe {
            region::protect(self.code.as_ptr::<u8>(), self.code.len(), region::Protection::READ_EXECUTE)
                .map_err(JitError::Protect)?;
            let start = self.code.as_ptr::<u8>() as *mut c_void;
            let end = (self.code.as_ptr::<u8>() as usize + self.code_len) as *mut c_void;
            __clear_cache(start, end);
        }
        self.executable = true;
        Ok(())
    }

    /// The entry point's callable address, valid only after
    /// [`Self::make_executable`].
    pub fn entry_point(&self, code_offset: u32) -> Result<*const (), JitError> {
        if !self.executable {
            return Err(JitError::NotExecutable);
        }
        Ok(unsafe { self.code.as_ptr::<u8>().add(code_offset as usize) as *const () })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_code_refuses_once_made_executable() {
        let mut region = JitMemoryRegion::allocate(4096, 0).unwrap();
        region.write_code(&[0, 0, 0, 0]).unwrap();
        region.make_executable().unwrap();
        assert!(region.write_code(&[1, 1, 1, 1]).is_err());
    }

    #[test]
    fn write_code_refuses_overflow() {
        let mut region = JitMemoryRegion::allocate(1, 0).unwrap();
        let cap = region.code_capacity();
        assert!(region.write_code(&vec![0u8; cap + 1]).is_err());
    }

    #[test]
    fn trampoline_is_sixteen_bytes() {
        let mut region = JitMemoryRegion::allocate(4096, 0).unwrap();
        let before = region.code_len();
        region.write_trampoline(0x1000).unwrap();
        assert_eq!(region.code_len() - before, 16);
    }

    #[test]
    fn make_executable_is_idempotent() {
        let mut region = JitMemoryRegion::allocate(4096, 0).unwrap();
        region.make_executable().unwrap();
        assert!(region.make_executable().is_ok());
        assert!(region.is_executable());
    }
}
