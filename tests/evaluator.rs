//! Value-set evaluator integration tests.
//!
//! Expressions are built with `RtlEmitter`, the free registers are bound to value sets and the
//! results are checked against hand-computed intervals and against table contents placed in
//! a program image.

use std::collections::HashMap;

use backwalk::{
    analysis::{StridedInterval, ValueSet, ValueSetEvaluator},
    image::{AccessMode, Endianness, ImageSegment, MemoryArea, Program, SegmentMap},
    ir::{Address, Constant, DataType, Identifier, RtlEmitter},
    Error, Result,
};

/// A readable segment at `0x00100000` whose first bytes are `table`.
fn program(table: &[u8], endianness: Endianness) -> Program {
    let mut bytes = vec![0u8; 0x1000];
    bytes[..table.len()].copy_from_slice(table);
    Program::new(
        SegmentMap::new(
            Address::ptr32(0x0010_0000),
            vec![ImageSegment::new(
                ".rdata",
                MemoryArea::new(Address::ptr32(0x0010_0000), bytes),
                AccessMode::READ,
            )],
        ),
        endianness,
    )
}

fn r1() -> Identifier {
    Identifier::register("r1", DataType::WORD32, 1)
}

fn bound(program: &Program, stride: i32, low: i64, high: i64) -> Result<ValueSetEvaluator<'_>> {
    let mut vse = ValueSetEvaluator::new(program, HashMap::new());
    vse.bind(
        r1(),
        ValueSet::interval(DataType::WORD32, StridedInterval::create(stride, low, high)?),
    );
    Ok(vse)
}

#[test]
fn test_index_arithmetic() -> Result<()> {
    let program = program(&[], Endianness::Little);
    let m = RtlEmitter::new();
    let vse = bound(&program, 4, 0, 20)?;

    assert_eq!(
        vse.evaluate(&m.iadd(r1(), 9))?,
        ValueSet::interval(DataType::WORD32, StridedInterval::create(4, 9, 29)?)
    );
    assert_eq!(vse.evaluate(&m.and(r1(), 0x1F))?.to_string(), "1[0,1F]");
    assert_eq!(vse.evaluate(&m.imul(r1(), 2))?.to_string(), "8[0,28]");
    assert_eq!(
        vse.evaluate(&m.iadd(r1(), r1()))?,
        vse.evaluate(&m.shl(r1(), 1))?
    );
    assert_eq!(
        vse.evaluate(&m.iadd(m.shl(r1(), 2), 0x0010_0000))?.to_string(),
        "10[100000,100050]"
    );
    Ok(())
}

#[test]
fn test_truncation() -> Result<()> {
    let program = program(&[], Endianness::Little);
    let m = RtlEmitter::new();

    let wide = bound(&program, 4, 0, 0x400)?;
    assert_eq!(
        wide.evaluate(&m.cast(DataType::BYTE, r1()))?,
        ValueSet::interval(DataType::BYTE, StridedInterval::create(1, 0, 255)?)
    );

    let single = bound(&program, 0, 0x1234, 0x1234)?;
    assert_eq!(
        single.evaluate(&m.cast(DataType::BYTE, r1()))?.to_string(),
        "0[34,34]"
    );
    Ok(())
}

#[test]
fn test_table_load_little_endian() -> Result<()> {
    let table: Vec<u8> = [0x0040_1000u32, 0x0040_1020, 0x0040_1010]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    let program = program(&table, Endianness::Little);
    let m = RtlEmitter::new();
    let vse = bound(&program, 1, 0, 2)?;

    let loaded = vse.evaluate(&m.mem32(m.iadd(m.shl(r1(), 2), 0x0010_0000)))?;
    let values: Vec<u64> = loaded.values().map(|c| c.to_u64()).collect();
    assert_eq!(values, [0x0040_1000, 0x0040_1020, 0x0040_1010]);
    assert_eq!(loaded.data_type(), DataType::WORD32);
    Ok(())
}

#[test]
fn test_table_load_big_endian() -> Result<()> {
    let program = program(&[0x12, 0x34, 0x56, 0x78], Endianness::Big);
    let m = RtlEmitter::new();
    let vse = bound(&program, 0, 0, 0)?;

    let loaded = vse.evaluate(&m.mem16(m.iadd(m.imul(r1(), 2), 0x0010_0000)))?;
    assert_eq!(loaded.to_string(), "[0x1234]");
    Ok(())
}

#[test]
fn test_load_bounded_by_max_reads() -> Result<()> {
    let program = program(&[], Endianness::Little);
    let m = RtlEmitter::new();
    let vse = bound(&program, 4, 0x0010_0000, 0x0010_0FFC)?.with_max_reads(3);

    let loaded = vse.evaluate(&m.mem32(r1()))?;
    assert_eq!(loaded.values().count(), 3);
    Ok(())
}

#[test]
fn test_unmapped_entries_are_invalid() -> Result<()> {
    let program = program(&[1, 0, 0, 0], Endianness::Little);
    let m = RtlEmitter::new();
    let vse = bound(&program, 0x1000, 0x0010_0000, 0x0010_1000)?;

    let loaded = vse.evaluate(&m.mem32(r1()))?;
    let values: Vec<Constant> = loaded.values().collect();
    assert_eq!(values, [Constant::word32(1), Constant::invalid()]);
    Ok(())
}

#[test]
fn test_sign_extended_byte_table() -> Result<()> {
    let program = program(&[0x10, 0xFF, 0x80], Endianness::Little);
    let m = RtlEmitter::new();
    let vse = bound(&program, 1, 0x0010_0000, 0x0010_0002)?;

    let loaded = vse.evaluate(&m.cast(DataType::INT32, m.mem8(r1())))?;
    assert_eq!(loaded.to_string(), "[16,-1,-128]");
    Ok(())
}

#[test]
fn test_representation_limits() -> Result<()> {
    let program = program(&[], Endianness::Little);
    let m = RtlEmitter::new();
    let vse = bound(&program, 4, 0x0010_0000, 0x0010_0010)?;

    assert!(matches!(
        vse.evaluate(&m.shl(m.mem32(r1()), 2)),
        Err(Error::NotSupported {
            operation: "shl",
            representation: "concrete"
        })
    ));
    assert!(matches!(
        vse.evaluate(&m.cast(DataType::INT64, r1())),
        Err(Error::NotSupported { .. })
    ));
    assert!(matches!(
        vse.evaluate(&m.xor(r1(), 1)),
        Err(Error::Unsupported { .. })
    ));
    Ok(())
}
