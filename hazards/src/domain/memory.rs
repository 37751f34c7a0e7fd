//! Simulated address space. Released blocks keep their bytes and are never reused.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

const STATIC_BASE: usize = 0x5555_5555_6000;
const HEAP_BASE: usize = 0x5555_5556_a000;
const STACK_BASE: usize = 0x7ffd_f000_0000;
const ALIGN: usize = 16;
// malloc keeps a chunk header in front of every heap block
const HEAP_HEADER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub usize);

impl Address {
    pub fn offset(self, by: usize) -> Address {
        Address(self.0 + by)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Static,
    Stack(FrameId),
    Heap,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Static => write!(f, "static"),
            Region::Stack(frame) => write!(f, "stack frame {}", frame),
            Region::Heap => write!(f, "heap"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Live,
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryFault {
    #[error("use after free: {address} ({region}) was already released")]
    UseAfterFree {
        address: Address,
        region: Region,
        stale: Vec<u8>,
    },
    #[error("double release: {address} was already released")]
    DoubleRelease { address: Address },
    #[error("{address} lives in {region} memory and cannot be released")]
    NotHeap { address: Address, region: Region },
    #[error("{address} is not mapped")]
    Unmapped { address: Address },
    #[error("access of {len} bytes at offset {offset} overruns the {size} byte block at {address}")]
    OutOfBounds {
        address: Address,
        offset: usize,
        len: usize,
        size: usize,
    },
    #[error("no active stack frame")]
    NoActiveFrame,
}

impl MemoryFault {
    /// Bytes left behind in a released block, up to the first NUL.
    pub fn stale_text(&self) -> Option<String> {
        match self {
            MemoryFault::UseAfterFree { stale, .. } => Some(until_nul(stale)),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub allocations: usize,
    pub releases: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameExit {
    pub frame: FrameId,
    pub destroyed: Vec<Address>,
}

#[derive(Debug)]
struct Block {
    region: Region,
    bytes: Vec<u8>,
    state: BlockState,
}

#[derive(Debug)]
pub struct Memory {
    blocks: BTreeMap<Address, Block>,
    frames: Vec<FrameId>,
    next_frame: u32,
    static_top: usize,
    heap_top: usize,
    stack_top: usize,
    stats: MemoryStats,
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}

impl Memory {
    pub fn new() -> Memory {
        Memory {
            blocks: BTreeMap::new(),
            frames: Vec::new(),
            next_frame: 0,
            static_top: STATIC_BASE,
            heap_top: HEAP_BASE,
            stack_top: STACK_BASE,
            stats: MemoryStats::default(),
        }
    }

    pub fn stats(&self) -> MemoryStats {
        self.stats
    }

    pub fn place_static(&mut self, bytes: &[u8]) -> Address {
        let address = Address(self.static_top);
        self.static_top += round_up(bytes.len().max(1));
        self.insert(address, Region::Static, bytes.to_vec());
        log::trace!(address:% = address, size = bytes.len(); "static placed");
        address
    }

    pub fn enter_frame(&mut self) -> FrameId {
        self.next_frame += 1;
        let frame = FrameId(self.next_frame);
        self.frames.push(frame);
        log::trace!(frame:% = frame; "frame entered");
        frame
    }

    /// Places a local in the innermost frame. The stack grows down.
    pub fn place_local(&mut self, bytes: &[u8]) -> Result<Address, MemoryFault> {
        let frame = *self.frames.last().ok_or(MemoryFault::NoActiveFrame)?;
        self.stack_top -= round_up(bytes.len().max(1));
        let address = Address(self.stack_top);
        self.insert(address, Region::Stack(frame), bytes.to_vec());
        log::trace!(address:% = address, frame:% = frame, size = bytes.len(); "local placed");
        Ok(address)
    }

    /// Pops the innermost frame and destroys every local it owns.
    /// Addresses previously handed out for those locals stay outstanding.
    pub fn exit_frame(&mut self) -> Result<FrameExit, MemoryFault> {
        let frame = self.frames.pop().ok_or(MemoryFault::NoActiveFrame)?;
        let destroyed: Vec<Address> = self
            .blocks
            .iter_mut()
            .filter(|(_, block)| block.region == Region::Stack(frame) && block.state == BlockState::Live)
            .map(|(address, block)| {
                block.state = BlockState::Released;
                *address
            })
            .collect();
        log::trace!(frame:% = frame, destroyed = destroyed.len(); "frame exited");
        Ok(FrameExit { frame, destroyed })
    }

    pub fn allocate(&mut self, size: usize) -> Address {
        self.heap_top += HEAP_HEADER;
        let address = Address(self.heap_top);
        self.heap_top += round_up(size.max(1));
        self.insert(address, Region::Heap, vec![0; size]);
        self.stats.allocations += 1;
        log::trace!(address:% = address, size = size; "heap allocate");
        address
    }

    pub fn release(&mut self, address: Address) -> Result<(), MemoryFault> {
        let block = self
            .blocks
            .get_mut(&address)
            .ok_or(MemoryFault::Unmapped { address })?;
        if block.region != Region::Heap {
            return Err(MemoryFault::NotHeap {
                address,
                region: block.region,
            });
        }
        if block.state == BlockState::Released {
            log::trace!(address:% = address; "heap release rejected");
            return Err(MemoryFault::DoubleRelease { address });
        }
        block.state = BlockState::Released;
        self.stats.releases += 1;
        log::trace!(address:% = address; "heap release");
        Ok(())
    }

    /// Moves a live heap block to fresh storage of `size` bytes and releases
    /// the old one, the way `realloc` does when it cannot grow in place.
    pub fn reallocate(&mut self, address: Address, size: usize) -> Result<Address, MemoryFault> {
        let (base, block) = self.locate(address)?;
        if base != address {
            return Err(MemoryFault::Unmapped { address });
        }
        if block.region != Region::Heap {
            return Err(MemoryFault::NotHeap {
                address,
                region: block.region,
            });
        }
        if block.state == BlockState::Released {
            return Err(MemoryFault::UseAfterFree {
                address,
                region: block.region,
                stale: block.bytes.clone(),
            });
        }
        let kept = block.bytes.len().min(size);
        let bytes = block.bytes[..kept].to_vec();

        let moved = self.allocate(size);
        self.write(moved, &bytes)?;
        self.release(address)?;
        log::trace!(from:% = address, to:% = moved, size = size; "heap reallocate");
        Ok(moved)
    }

    pub fn read(&self, address: Address, len: usize) -> Result<Vec<u8>, MemoryFault> {
        let (base, block) = self.locate(address)?;
        let offset = address.0 - base.0;
        check_bounds(base, block, offset, len)?;
        let bytes = block.bytes[offset..offset + len].to_vec();
        match block.state {
            BlockState::Live => Ok(bytes),
            BlockState::Released => Err(MemoryFault::UseAfterFree {
                address,
                region: block.region,
                stale: bytes,
            }),
        }
    }

    /// Reads a NUL terminated string starting at `address`. A missing
    /// terminator stops the read at the end of the block.
    pub fn read_str(&self, address: Address) -> Result<String, MemoryFault> {
        let (base, block) = self.locate(address)?;
        let offset = address.0 - base.0;
        let tail = &block.bytes[offset..];
        let end = tail.iter().position(|b| *b == 0).unwrap_or(tail.len());
        match block.state {
            BlockState::Live => Ok(until_nul(&tail[..end])),
            BlockState::Released => Err(MemoryFault::UseAfterFree {
                address,
                region: block.region,
                stale: tail[..end].to_vec(),
            }),
        }
    }

    pub fn write(&mut self, address: Address, bytes: &[u8]) -> Result<(), MemoryFault> {
        let (base, _) = self.locate(address)?;
        let offset = address.0 - base.0;
        let block = self
            .blocks
            .get_mut(&base)
            .ok_or(MemoryFault::Unmapped { address })?;
        check_bounds(base, block, offset, bytes.len())?;
        if block.state == BlockState::Released {
            return Err(MemoryFault::UseAfterFree {
                address,
                region: block.region,
                stale: block.bytes[offset..offset + bytes.len()].to_vec(),
            });
        }
        block.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn fill(&mut self, address: Address, byte: u8, len: usize) -> Result<(), MemoryFault> {
        self.write(address, &vec![byte; len])
    }

    /// State of the block containing `address`, `None` when unmapped.
    pub fn state_of(&self, address: Address) -> Option<BlockState> {
        self.locate(address).ok().map(|(_, block)| block.state)
    }

    fn insert(&mut self, address: Address, region: Region, bytes: Vec<u8>) {
        self.blocks.insert(
            address,
            Block {
                region,
                bytes,
                state: BlockState::Live,
            },
        );
    }

    fn locate(&self, address: Address) -> Result<(Address, &Block), MemoryFault> {
        self.blocks
            .range(..=address)
            .next_back()
            .filter(|(base, block)| address.0 < base.0 + block.bytes.len().max(1))
            .map(|(base, block)| (*base, block))
            .ok_or(MemoryFault::Unmapped { address })
    }
}

fn check_bounds(base: Address, block: &Block, offset: usize, len: usize) -> Result<(), MemoryFault> {
    if offset + len > block.bytes.len() {
        return Err(MemoryFault::OutOfBounds {
            address: base,
            offset,
            len,
            size: block.bytes.len(),
        });
    }
    Ok(())
}

fn round_up(size: usize) -> usize {
    size.div_ceil(ALIGN) * ALIGN
}

fn until_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
