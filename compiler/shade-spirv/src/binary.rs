//! SPIR-V binary decoding. A module is a header of five words followed by a
//! stream of instructions, each of which starts with a word holding its word
//! count in the high half and its opcode in the low half.

use thiserror::Error;

use crate::opcode::op;

/// The magic number that every SPIR-V module starts with.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// The number of words in the module header.
pub const HEADER_WORDS: usize = 5;

/// Errors that can occur when reading malformed SPIR-V.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpirvError {
    #[error("the module is {0} words long, which is shorter than the SPIR-V header")]
    TooShort(usize),

    #[error("invalid SPIR-V magic number {0:#010x}")]
    BadMagic(u32),

    #[error("instruction at word {offset} declares an invalid word count of {count}")]
    BadWordCount { offset: usize, count: usize },

    #[error("instruction at word {offset} runs past the end of the module")]
    Truncated { offset: usize },

    #[error("instruction at word {offset} with opcode {opcode} is missing operand {index}")]
    MissingOperand { offset: usize, opcode: u16, index: usize },

    #[error("literal string in instruction at word {offset} is not valid")]
    BadString { offset: usize },

    #[error("byte length {0} is not a multiple of the word size")]
    UnalignedBytes(usize),
}

/// A single decoded instruction, borrowing its operands from the module.
#[derive(Debug, Clone, Copy)]
pub struct Instruction<'a> {
    /// The opcode of the instruction.
    pub opcode: u16,

    /// The position of the first word of the instruction in the module.
    pub offset: usize,

    /// Every word after the opcode word.
    pub operands: &'a [u32],
}

impl<'a> Instruction<'a> {
    /// Get the operand at `index`.
    pub fn operand(&self, index: usize) -> Result<u32, SpirvError> {
        self.operands.get(index).copied().ok_or(SpirvError::MissingOperand {
            offset: self.offset,
            opcode: self.opcode,
            index,
        })
    }

    /// Decode the literal string that starts at operand `index`. Returns the
    /// string and the index of the first operand after it.
    pub fn string(&self, index: usize) -> Result<(String, usize), SpirvError> {
        let words = self.operands.get(index..).ok_or(SpirvError::MissingOperand {
            offset: self.offset,
            opcode: self.opcode,
            index,
        })?;

        let (value, consumed) =
            decode_string(words).ok_or(SpirvError::BadString { offset: self.offset })?;
        Ok((value, index + consumed))
    }

    /// The total number of words of the instruction.
    pub fn word_count(&self) -> usize {
        self.operands.len() + 1
    }
}

/// A validated view over the words of a SPIR-V module.
#[derive(Debug, Clone, Copy)]
pub struct SpirvModule<'a> {
    words: &'a [u32],
}

impl<'a> SpirvModule<'a> {
    /// Validate the header of a module.
    pub fn parse(words: &'a [u32]) -> Result<Self, SpirvError> {
        if words.len() < HEADER_WORDS {
            return Err(SpirvError::TooShort(words.len()));
        }

        if words[0] != SPIRV_MAGIC {
            return Err(SpirvError::BadMagic(words[0]));
        }

        Ok(Self { words })
    }

    /// The `(major, minor)` version of the module.
    pub fn version(&self) -> (u8, u8) {
        let version = self.words[1];
        ((version >> 16) as u8, (version >> 8) as u8)
    }

    /// The upper bound of every result id in the module.
    pub fn bound(&self) -> u32 {
        self.words[3]
    }

    /// The raw words of the module, including the header.
    pub fn words(&self) -> &'a [u32] {
        self.words
    }

    /// Iterate over the instructions of the module, the iterator stops after
    /// yielding the first error.
    pub fn instructions(&self) -> Instructions<'a> {
        Instructions { words: self.words, offset: HEADER_WORDS, failed: false }
    }
}

/// An iterator over the instructions of a [SpirvModule].
pub struct Instructions<'a> {
    words: &'a [u32],
    offset: usize,
    failed: bool,
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, SpirvError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.words.len() {
            return None;
        }

        let offset = self.offset;
        let first = self.words[offset];
        let count = (first >> 16) as usize;
        let opcode = (first & 0xffff) as u16;

        if count == 0 {
            self.failed = true;
            return Some(Err(SpirvError::BadWordCount { offset, count }));
        }

        let Some(operands) = self.words.get(offset + 1..offset + count) else {
            self.failed = true;
            return Some(Err(SpirvError::Truncated { offset }));
        };

        self.offset += count;
        Some(Ok(Instruction { opcode, offset, operands }))
    }
}

/// Decode a nul terminated UTF-8 literal string that is packed into words,
/// returning the string and the number of words it occupied.
pub fn decode_string(words: &[u32]) -> Option<(String, usize)> {
    let mut bytes = Vec::new();

    for (index, word) in words.iter().enumerate() {
        for byte in word.to_le_bytes() {
            if byte == 0 {
                return String::from_utf8(bytes).ok().map(|value| (value, index + 1));
            }
            bytes.push(byte);
        }
    }

    None
}

/// Remove the instructions that carry source level debug information
/// (`OpSource`, `OpString`, `OpLine` and friends) while keeping names. The
/// header is copied unchanged.
pub fn strip_debug_source(words: &[u32]) -> Result<Vec<u32>, SpirvError> {
    let module = SpirvModule::parse(words)?;
    let mut stripped = Vec::with_capacity(words.len());
    stripped.extend_from_slice(&words[..HEADER_WORDS]);

    for instruction in module.instructions() {
        let instruction = instruction?;

        if !op::DEBUG_SOURCE.contains(&instruction.opcode) {
            let end = instruction.offset + instruction.word_count();
            stripped.extend_from_slice(&words[instruction.offset..end]);
        }
    }

    Ok(stripped)
}

/// Whether the module contains any source level debug information.
pub fn has_debug_source(words: &[u32]) -> Result<bool, SpirvError> {
    for instruction in SpirvModule::parse(words)?.instructions() {
        if op::DEBUG_SOURCE.contains(&instruction?.opcode) {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Encode words as little endian bytes.
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

/// Decode little endian bytes into words.
pub fn bytes_to_words(bytes: &[u8]) -> Result<Vec<u32>, SpirvError> {
    if bytes.len() % 4 != 0 {
        return Err(SpirvError::UnalignedBytes(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A tiny hand assembled module builder for tests.
    pub(crate) struct Assembler {
        pub words: Vec<u32>,
    }

    impl Assembler {
        pub fn new() -> Self {
            Self { words: vec![SPIRV_MAGIC, 0x0001_0000, 0, 64, 0] }
        }

        pub fn emit(&mut self, opcode: u16, operands: &[u32]) -> &mut Self {
            self.words.push(((operands.len() as u32 + 1) << 16) | opcode as u32);
            self.words.extend_from_slice(operands);
            self
        }

        /// Encode a literal string operand.
        pub fn string(value: &str) -> Vec<u32> {
            let mut bytes = value.as_bytes().to_vec();
            bytes.push(0);
            while bytes.len() % 4 != 0 {
                bytes.push(0);
            }
            bytes_to_words(&bytes).unwrap()
        }

        pub fn name(&mut self, id: u32, value: &str) -> &mut Self {
            let mut operands = vec![id];
            operands.extend(Self::string(value));
            self.emit(op::NAME, &operands)
        }
    }

    #[test]
    fn headers_are_validated() {
        assert_eq!(SpirvModule::parse(&[SPIRV_MAGIC, 0]).unwrap_err(), SpirvError::TooShort(2));
        assert_eq!(
            SpirvModule::parse(&[0xdead_beef, 0, 0, 0, 0]).unwrap_err(),
            SpirvError::BadMagic(0xdead_beef)
        );

        let module = Assembler::new();
        let module = SpirvModule::parse(&module.words).unwrap();
        assert_eq!(module.version(), (1, 0));
        assert_eq!(module.bound(), 64);
        assert_eq!(module.instructions().count(), 0);
    }

    #[test]
    fn truncated_instructions_are_errors() {
        let mut module = Assembler::new();
        module.name(1, "color");
        let mut words = module.words.clone();
        words.pop();

        let results: Vec<_> = SpirvModule::parse(&words).unwrap().instructions().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(SpirvError::Truncated { offset: HEADER_WORDS })));

        words.push(0);
        words[HEADER_WORDS] = op::NAME as u32;
        let first = SpirvModule::parse(&words).unwrap().instructions().next().unwrap();
        assert!(matches!(first, Err(SpirvError::BadWordCount { count: 0, .. })));
    }

    #[test]
    fn strings_are_decoded_from_operands() {
        let mut module = Assembler::new();
        module.name(7, "albedo_texture");

        let module = SpirvModule::parse(&module.words).unwrap();
        let instruction = module.instructions().next().unwrap().unwrap();

        assert_eq!(instruction.opcode, op::NAME);
        assert_eq!(instruction.operand(0).unwrap(), 7);
        assert_eq!(instruction.string(1).unwrap(), ("albedo_texture".to_string(), 5));
        assert!(instruction.operand(9).is_err());
    }

    #[test]
    fn debug_source_is_stripped_but_names_are_kept() {
        let mut module = Assembler::new();
        let file = Assembler::string("sky.wgsl");
        module
            .emit(op::STRING, &[1, file[0], file[1], file[2]])
            .emit(op::SOURCE, &[10, 100, 1])
            .name(2, "sky")
            .emit(op::LINE, &[1, 4, 2]);

        assert!(has_debug_source(&module.words).unwrap());

        let stripped = strip_debug_source(&module.words).unwrap();
        assert!(!has_debug_source(&stripped).unwrap());

        let opcodes: Vec<_> = SpirvModule::parse(&stripped)
            .unwrap()
            .instructions()
            .map(|instruction| instruction.unwrap().opcode)
            .collect();
        assert_eq!(opcodes, [op::NAME]);
    }

    #[test]
    fn bytes_must_be_word_aligned() {
        assert_eq!(bytes_to_words(&[1, 2, 3]).unwrap_err(), SpirvError::UnalignedBytes(3));
        assert_eq!(bytes_to_words(&words_to_bytes(&[SPIRV_MAGIC, 5])).unwrap(), [SPIRV_MAGIC, 5]);
    }
}
