use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use iron_hart_core::core::Hart;
use iron_hart_core::AddressRange;
use log::debug;

/// A loadable segment of an ELF file.
#[derive(Debug)]
pub struct Segment<'a> {
    pub address: u32,
    pub bytes: &'a [u8],
}

/// The parts of an ELF executable the simulator needs.
#[derive(Debug)]
pub struct Image<'a> {
    pub entry: u32,
    pub segments: Vec<Segment<'a>>,
    /// Address span of each loadable segment, including the address right after its end so
    /// that a program may run up to its last instruction.
    pub ranges: Vec<AddressRange>,
    elf: Elf<'a>,
}

impl<'a> Image<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self, goblin::error::Error> {
        let elf = Elf::parse(buf)?;
        let mut segments = Vec::new();
        let mut ranges = Vec::new();
        for header in elf.program_headers.iter().filter(|h| h.p_type == PT_LOAD) {
            let address = header.p_vaddr as u32;
            let bytes = buf.get(header.file_range()).ok_or_else(|| {
                goblin::error::Error::Malformed(format!(
                    "segment at {address:#010x} lies outside the file"
                ))
            })?;
            debug!(
                "Segment at {address:#010x}: {:#x} bytes from file, {:#x} in memory",
                header.p_filesz, header.p_memsz
            );
            let memsz = u32::try_from(header.p_memsz).unwrap_or(u32::MAX);
            if let Some(range) = program_range(address, memsz) {
                debug!("Program range {range}");
                ranges.push(range);
            }
            segments.push(Segment { address, bytes });
        }
        Ok(Self {
            entry: elf.entry as u32,
            segments,
            ranges,
            elf,
        })
    }

    /// Returns the address of the symbol called `name`.
    pub fn symbol(&self, name: &str) -> Option<u32> {
        self.elf
            .syms
            .iter()
            .find(|sym| self.elf.strtab.get_at(sym.st_name) == Some(name))
            .map(|sym| sym.st_value as u32)
    }

    /// Copy every segment into the hart's memory. Bytes past a segment's file size stay zero.
    pub fn load_into(&self, hart: &mut Hart) {
        for segment in &self.segments {
            hart.load(segment.address, segment.bytes);
        }
    }
}

/// The fetch range of a segment of `memsz` bytes at `address`: the segment plus the address right
/// after it, clamped to the top of the address space. Empty segments have no range.
fn program_range(address: u32, memsz: u32) -> Option<AddressRange> {
    if memsz == 0 {
        return None;
    }
    AddressRange::with_len(address, memsz.saturating_add(1))
        .or_else(|_| AddressRange::new(address, u32::MAX))
        .ok()
}
