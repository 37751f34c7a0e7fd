use crate::domain::ids::DisplayIds;
use crate::domain::memory::{Address, Memory, MemoryFault};

/// A string that owns one NUL terminated heap buffer.
///
/// Not `Clone`: copies go through [`OwnedBuffer::shallow_copy`] or
/// [`OwnedBuffer::deep_copy`] so the caller states which one it means.
/// A shallow copy duplicates every member, the buffer address and display id
/// included, and leaves two values that each believe they own the buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct OwnedBuffer {
    id: u32,
    data: Address,
    len: usize,
}

impl OwnedBuffer {
    pub fn new(memory: &mut Memory, ids: &mut DisplayIds, text: &str) -> Result<OwnedBuffer, MemoryFault> {
        let id = ids.next();
        let data = memory.allocate(text.len() + 1);
        memory.write(data, text.as_bytes())?;
        memory.write(data.offset(text.len()), &[0])?;
        log::debug!(id = id, data:% = data; "owned buffer constructed");
        Ok(OwnedBuffer {
            id,
            data,
            len: text.len(),
        })
    }

    pub fn shallow_copy(&self) -> OwnedBuffer {
        OwnedBuffer {
            id: self.id,
            data: self.data,
            len: self.len,
        }
    }

    pub fn deep_copy(&self, memory: &mut Memory, ids: &mut DisplayIds) -> Result<OwnedBuffer, MemoryFault> {
        let text = self.contents(memory)?;
        OwnedBuffer::new(memory, ids, &text)
    }

    pub fn contents(&self, memory: &Memory) -> Result<String, MemoryFault> {
        memory.read_str(self.data)
    }

    /// Releases the buffer. Returns the address that was released.
    pub fn destroy(self, memory: &mut Memory) -> Result<Address, MemoryFault> {
        log::debug!(id = self.id, data:% = self.data; "owned buffer destroyed");
        memory.release(self.data)?;
        Ok(self.data)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn data(&self) -> Address {
        self.data
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shallow_copy_shares_the_buffer() {
        let mut memory = Memory::new();
        let mut ids = DisplayIds::new();
        let original = OwnedBuffer::new(&mut memory, &mut ids, "hello").unwrap();
        let allocations = memory.stats().allocations;

        let copy = original.shallow_copy();
        assert_eq!(memory.stats().allocations, allocations);
        assert_eq!(copy.data(), original.data());
        assert_eq!(copy.id(), original.id());
        assert_eq!(copy.contents(&memory).unwrap(), "hello");
    }

    #[test]
    fn test_deep_copy_allocates() {
        let mut memory = Memory::new();
        let mut ids = DisplayIds::new();
        let original = OwnedBuffer::new(&mut memory, &mut ids, "hello").unwrap();

        let copy = original.deep_copy(&mut memory, &mut ids).unwrap();
        assert_ne!(copy.data(), original.data());
        assert_eq!(copy.id(), 2);
        assert_eq!(memory.stats().allocations, 2);

        assert!(copy.destroy(&mut memory).is_ok());
        assert!(original.destroy(&mut memory).is_ok());
    }

    #[test]
    fn test_empty_text_still_owns_a_terminator() {
        let mut memory = Memory::new();
        let mut ids = DisplayIds::new();
        let empty = OwnedBuffer::new(&mut memory, &mut ids, "").unwrap();
        let text = OwnedBuffer::new(&mut memory, &mut ids, "hello").unwrap();

        assert!(empty.is_empty());
        assert_eq!(empty.contents(&memory).unwrap(), "");
        assert!(!text.is_empty());
        assert_eq!(text.len(), 5);
        assert_eq!(memory.stats().allocations, 2);
        assert!(empty.destroy(&mut memory).is_ok());
    }

    #[test]
    fn test_destroying_both_shallow_copies() {
        let mut memory = Memory::new();
        let mut ids = DisplayIds::new();
        let original = OwnedBuffer::new(&mut memory, &mut ids, "hello").unwrap();
        let copy = original.shallow_copy();
        let data = original.data();

        assert_eq!(copy.destroy(&mut memory), Ok(data));
        assert_eq!(
            original.destroy(&mut memory),
            Err(MemoryFault::DoubleRelease { address: data })
        );
    }
}
