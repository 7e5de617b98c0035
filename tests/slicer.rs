//! Backward slicer integration tests.
//!
//! Each test lifts a small procedure by hand with `RtlEmitter`, registers its blocks in a
//! `BlockGraph` and drives a `BackwardSlicer` from the block ending in the indirect jump,
//! checking liveness, the recovered jump-table format and the index range after each step.

use backwalk::{
    analysis::{
        BackwardSlicer, BitRange, BlockGraph, BlockId, RtlBackwalkHost, SliceState,
        SlicerConfig, StridedInterval,
    },
    image::{AccessMode, Endianness, ImageSegment, MemoryArea, Program, SegmentMap},
    ir::{
        Address, BinaryOp, ConditionCode, Constant, DataType, Expression, Identifier, RtlBlock,
        RtlEmitter,
    },
    Error, Result,
};

/// A 64 KiB executable `.text` segment at `0x00120000`.
fn program() -> Program {
    Program::new(
        SegmentMap::new(
            Address::ptr32(0x0012_0000),
            vec![ImageSegment::new(
                ".text",
                MemoryArea::new(Address::ptr32(0x0012_0000), vec![0; 0x1_0000]),
                AccessMode::READ_EXECUTE,
            )],
        ),
        Endianness::Little,
    )
}

fn reg(n: u32) -> Identifier {
    Identifier::register(format!("r{n}"), DataType::WORD32, n)
}

fn cc(name: &str) -> Identifier {
    Identifier::flag_group(name, 0)
}

fn block(addr: u32) -> RtlBlock {
    RtlBlock::new(Address::ptr32(addr), format!("l{addr:08X}"))
}

/// Live expressions of the slicer's current state, rendered and sorted.
fn live_names(slicer: &BackwardSlicer<'_, RtlBackwalkHost>) -> String {
    let mut names: Vec<String> = slicer
        .live()
        .map(|live| live.keys().map(ToString::to_string).collect())
        .unwrap_or_default();
    names.sort();
    names.join(",")
}

/// `l00000100` tests `r2` against 4 and branches to `l00000200`, which dispatches on
/// `r2 << 2`.
fn range_check_graph(condition: ConditionCode, taken: u32) -> (BlockGraph, BlockId) {
    let (r1, r2, cz) = (reg(1), reg(2), cc("CZ"));
    let m = RtlEmitter::new();

    let mut b = block(0x100);
    b.emit(|e| e.assign(cz.clone(), m.cond(m.isub(r2.clone(), 4))));
    b.emit(|e| e.branch(m.test(condition, cz.clone()), Address::ptr32(taken)));
    let mut b2 = block(0x200);
    b2.emit(|e| e.assign(r1.clone(), m.shl(r2.clone(), 2)));
    b2.emit(|e| e.goto(m.iadd(r1.clone(), 0x0012_3400)));

    let mut graph = BlockGraph::new();
    let b = graph.add_block(b);
    let b2 = graph.add_block(b2);
    graph.add_edge(b, b2).unwrap();
    (graph, b2)
}

#[test]
fn test_detect_register() {
    let r1 = reg(1);
    let mut b = block(0x10);
    b.emit(|e| e.goto(r1.clone()));

    let mut state = SliceState::new(&b, SlicerConfig::default());
    let result = state
        .visit_instruction(b.instructions().last().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(
        result.live_exprs().get(&r1.into()),
        Some(&BitRange::new(0, 32))
    );
}

#[test]
fn test_detect_no_register() {
    let mut b = block(0x10);
    b.emit(|e| e.goto(Address::ptr32(0x0012_3400)));

    let mut state = SliceState::new(&b, SlicerConfig::default());
    let result = state
        .visit_instruction(b.instructions().last().unwrap())
        .unwrap()
        .unwrap();
    assert!(result.live_exprs().is_empty());

    let mut graph = BlockGraph::new();
    let id = graph.add_block(b);
    let host = RtlBackwalkHost::new(graph, program());
    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(!slicer.start(host.block(id).unwrap()).unwrap());
    assert!(slicer.live().unwrap().is_empty());
    assert!(!slicer.step().unwrap());
}

#[test]
fn test_seed_slicer() -> Result<()> {
    let mut b = block(0x10);
    b.emit(|e| e.goto(reg(1)));
    let mut graph = BlockGraph::new();
    let id = graph.add_block(b);
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(id).unwrap())?);
    Ok(())
}

#[test]
fn test_detect_addition() -> Result<()> {
    let m = RtlEmitter::new();
    let mut b = block(0x100);
    b.emit(|e| e.goto(m.iadd(reg(1), 0x0012_3400)));
    let mut graph = BlockGraph::new();
    let id = graph.add_block(b);
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(id).unwrap())?);
    assert_eq!(slicer.live().unwrap().len(), 1);
    assert_eq!(
        slicer.jump_table_format().unwrap().to_string(),
        "r1 + 0x00123400"
    );
    Ok(())
}

#[test]
fn test_kill_liveness() -> Result<()> {
    let (r1, r2) = (reg(1), reg(2));
    let m = RtlEmitter::new();
    let mut b = block(0x100);
    b.emit(|e| e.assign(r1.clone(), m.shl(r2.clone(), 2)));
    b.emit(|e| e.goto(m.iadd(r1.clone(), 0x0012_3400)));
    let mut graph = BlockGraph::new();
    let id = graph.add_block(b);
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(id).unwrap())?);
    assert!(slicer.step()?);
    assert_eq!(slicer.live().unwrap().len(), 1);
    assert_eq!(live_names(&slicer), "r2");
    Ok(())
}

#[test]
fn test_dead_assignment_is_skipped() -> Result<()> {
    let (r1, r3) = (reg(1), reg(3));
    let m = RtlEmitter::new();
    let mut b = block(0x100);
    b.emit(|e| e.assign(r3.clone(), m.iadd(r3.clone(), 1)));
    b.emit(|e| e.assign(m.mem32(r3.clone()), r1.clone()));
    b.emit(|e| e.nop());
    b.emit(|e| e.goto(r1.clone()));
    let mut graph = BlockGraph::new();
    let id = graph.add_block(b);
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(id).unwrap())?);
    for _ in 0..3 {
        assert!(slicer.step()?);
        assert_eq!(live_names(&slicer), "r1");
    }
    assert_eq!(slicer.jump_table_format().unwrap().to_string(), "r1");
    Ok(())
}

#[test]
fn test_across_jump() -> Result<()> {
    let (r1, r2) = (reg(1), reg(2));
    let m = RtlEmitter::new();
    let mut b = block(0x100);
    b.emit(|e| e.assign(r1.clone(), m.shl(r2.clone(), 2)));
    b.emit(|e| e.goto(Address::ptr32(0x200)));
    let mut b2 = block(0x200);
    b2.emit(|e| e.goto(m.iadd(r1.clone(), 0x0012_3400)));

    let mut graph = BlockGraph::new();
    let b = graph.add_block(b);
    let b2 = graph.add_block(b2);
    graph.add_edge(b, b2)?;
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(b2).unwrap())?); // indirect jump
    assert!(slicer.step()?); // direct jump
    assert_eq!(live_names(&slicer), "r1");
    assert!(slicer.step()?); // shift left
    assert_eq!(slicer.live().unwrap().len(), 1);
    assert_eq!(live_names(&slicer), "r2");
    assert_eq!(
        slicer.jump_table_format().unwrap().to_string(),
        "(r2 << 2) + 0x00123400"
    );
    Ok(())
}

#[test]
fn test_branch_taken() -> Result<()> {
    let (r1, r2, cz) = (reg(1), reg(2), cc("CZ"));
    let m = RtlEmitter::new();
    let mut b = block(0x100);
    b.emit(|e| e.branch(m.test(ConditionCode::Ule, cz.clone()), Address::ptr32(0x200)));
    let mut b2 = block(0x200);
    b2.emit(|e| e.assign(r1.clone(), m.shl(r2.clone(), 2)));
    b2.emit(|e| e.goto(m.iadd(r1.clone(), 0x0012_3400)));

    let mut graph = BlockGraph::new();
    let b = graph.add_block(b);
    let b2 = graph.add_block(b2);
    graph.add_edge(b, b2)?;
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(b2).unwrap())?); // indirect jump
    assert!(slicer.step()?); // shift left
    assert!(slicer.step()?); // branch
    assert_eq!(slicer.live().unwrap().len(), 2);
    assert_eq!(live_names(&slicer), "CZ,r2");
    assert_eq!(slicer.jump_table_index().unwrap(), &Expression::from(cz));
    Ok(())
}

#[test]
fn test_range_check() -> Result<()> {
    let (graph, jump) = range_check_graph(ConditionCode::Ule, 0x200);
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(jump).unwrap())?); // indirect jump
    assert!(slicer.step()?); // shift left
    assert!(slicer.step()?); // branch
    assert!(!slicer.step()?); // test
    assert_eq!(live_names(&slicer), "r2");

    assert_eq!(
        slicer.jump_table_index_interval(),
        StridedInterval::create(1, 0, 4)?
    );
    assert_eq!(slicer.jump_table_index().unwrap(), &Expression::from(reg(2)));
    assert_eq!(
        slicer.jump_table_format().unwrap().to_string(),
        "(r2 << 2) + 0x00123400"
    );
    assert!(!slicer.step()?);
    Ok(())
}

#[test]
fn test_range_check_on_fall_through_edge() -> Result<()> {
    // `branch UGT` away from the dispatch means the dispatch runs when `r2 <=u 4`.
    let (graph, jump) = range_check_graph(ConditionCode::Ugt, 0x300);
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(jump).unwrap())?);
    while slicer.step()? {}
    assert_eq!(
        slicer.jump_table_index_interval(),
        StridedInterval::create(1, 0, 4)?
    );
    Ok(())
}

#[test]
fn test_range_check_lower_bound() -> Result<()> {
    let (graph, jump) = range_check_graph(ConditionCode::Uge, 0x200);
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(jump).unwrap())?);
    while slicer.step()? {}
    assert_eq!(
        slicer.jump_table_index_interval(),
        StridedInterval::create(1, 4, i64::MAX)?
    );
    Ok(())
}

#[test]
fn test_range_check_unknown_condition_code() {
    let (graph, jump) = range_check_graph(ConditionCode::Eq, 0x200);
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(jump).unwrap()).unwrap());
    assert!(slicer.step().unwrap());
    assert!(slicer.step().unwrap());
    assert!(matches!(slicer.step(), Err(Error::Unsupported { .. })));
}

#[test]
fn test_mask_bounds_index() -> Result<()> {
    let (r1, cz) = (reg(1), cc("CZ"));
    let m = RtlEmitter::new();
    let mut b = block(0x100);
    b.emit(|e| e.assign(r1.clone(), m.and(r1.clone(), 7)));
    b.emit(|e| e.assign(cz.clone(), m.cond(r1.clone())));
    b.emit(|e| {
        e.goto(m.mem32(m.iadd(
            Constant::word32(0x0012_3400),
            m.imul(r1.clone(), 4),
        )));
    });
    let mut graph = BlockGraph::new();
    let id = graph.add_block(b);
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(id).unwrap())?);
    assert!(slicer.step()?); // condition codes are dead
    assert!(!slicer.step()?); // mask
    assert_eq!(
        slicer.jump_table_index_interval(),
        StridedInterval::create(1, 0, 7)?
    );
    assert_eq!(slicer.jump_table_index().unwrap(), &Expression::from(r1));
    assert!(!slicer.step()?);
    Ok(())
}

#[test]
fn test_mask_not_a_power_of_two() -> Result<()> {
    let r1 = reg(1);
    let m = RtlEmitter::new();
    let mut b = block(0x100);
    b.emit(|e| e.assign(r1.clone(), m.and(r1.clone(), 6)));
    b.emit(|e| e.goto(r1.clone()));
    let mut graph = BlockGraph::new();
    let id = graph.add_block(b);
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(id).unwrap())?);
    assert!(!slicer.step()?);
    assert!(slicer.jump_table_index_interval().is_empty());
    Ok(())
}

#[test]
fn test_xor_clears_high_byte() -> Result<()> {
    let bx = Identifier::register("bx", DataType::WORD16, 3);
    let bh = Identifier::sub_register("bh", DataType::BYTE, 3, 8);
    let m = RtlEmitter::new();

    let mut b = block(0x100);
    b.emit(|e| e.assign(bh.clone(), m.xor(bh.clone(), bh.clone())));
    b.emit(|e| e.assign(bx.clone(), m.iadd(bx.clone(), bx.clone())));
    b.emit(|e| e.goto(m.mem16(m.iadd(bx.clone(), 0x1000))));
    let mut graph = BlockGraph::new();
    let id = graph.add_block(b);
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(id).unwrap())?);
    assert!(slicer.step()?); // bx + bx
    assert!(slicer.step()?); // xor bh,bh

    let bx_expr = Expression::from(bx);
    assert_eq!(
        slicer.live().unwrap().get(&bx_expr),
        Some(&BitRange::new(0, 8))
    );

    let zero_extended = Expression::cast(
        DataType::WORD16,
        Expression::cast(DataType::BYTE, bx_expr),
    );
    let expected = Expression::mem(
        DataType::WORD16,
        Expression::binary(
            BinaryOp::IAdd,
            DataType::WORD16,
            Expression::binary(
                BinaryOp::IMul,
                DataType::WORD16,
                zero_extended,
                Constant::word(16, 2).into(),
            ),
            Constant::word16(0x1000).into(),
        ),
    );
    assert_eq!(slicer.jump_table_format(), Some(&expected));
    Ok(())
}

#[test]
fn test_segmented_byte_index() -> Result<()> {
    let al = Identifier::sub_register("al", DataType::BYTE, 0, 0);
    let bx = Identifier::register("bx", DataType::WORD16, 3);
    let bl = Identifier::sub_register("bl", DataType::BYTE, 3, 0);
    let bh = Identifier::sub_register("bh", DataType::BYTE, 3, 8);
    let cs = Identifier::register("cs", DataType::WORD16, 9);
    let m = RtlEmitter::new();

    let mut b = block(0x100);
    b.emit(|e| e.assign(bl.clone(), al.clone()));
    b.emit(|e| e.assign(bh.clone(), m.xor(bh.clone(), bh.clone())));
    b.emit(|e| e.assign(bx.clone(), m.iadd(bx.clone(), bx.clone())));
    b.emit(|e| e.goto(m.seg_mem(DataType::WORD16, cs.clone(), m.iadd(bx.clone(), 0x1000))));
    let mut graph = BlockGraph::new();
    let id = graph.add_block(b);
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(id).unwrap())?);
    assert_eq!(live_names(&slicer), "bx");
    assert!(slicer.step()?); // bx + bx
    assert!(slicer.step()?); // xor bh,bh
    assert!(slicer.step()?); // bl := al
    assert_eq!(live_names(&slicer), "al");
    assert_eq!(
        slicer.live().unwrap().get(&Expression::from(al.clone())),
        Some(&BitRange::new(0, 8))
    );

    let zero_extended = Expression::cast(
        DataType::WORD16,
        Expression::cast(DataType::BYTE, Expression::from(al)),
    );
    let expected = Expression::SegmentedAccess {
        segment: Box::new(Expression::from(cs)),
        effective_address: Box::new(Expression::binary(
            BinaryOp::IAdd,
            DataType::WORD16,
            Expression::binary(
                BinaryOp::IMul,
                DataType::WORD16,
                zero_extended,
                Constant::word(16, 2).into(),
            ),
            Constant::word16(0x1000).into(),
        )),
        data_type: DataType::WORD16,
    };
    assert_eq!(slicer.jump_table_format(), Some(&expected));
    assert!(slicer.jump_table_format().unwrap().to_string().starts_with("Mem[cs:"));

    assert!(slicer.step()?); // no predecessors
    assert!(!slicer.step()?);
    Ok(())
}

#[test]
fn test_unsupported_constructs() {
    let (r1, r2) = (reg(1), reg(2));
    let m = RtlEmitter::new();

    let mut b = block(0x100);
    b.emit(|e| e.call(Address::ptr32(0x500)));
    b.emit(|e| e.goto(r1.clone()));
    let mut b2 = block(0x200);
    b2.emit(|e| {
        e.assign(
            r1.clone(),
            Expression::Unary {
                op: backwalk::ir::UnaryOp::Neg,
                data_type: DataType::WORD32,
                operand: Box::new(r2.clone().into()),
            },
        );
    });
    b2.emit(|e| e.goto(r1.clone()));
    let mut b3 = block(0x300);
    b3.emit(|e| e.goto(m.mem32(Expression::Phi {
        data_type: DataType::WORD32,
        arguments: vec![r1.clone().into(), r2.clone().into()],
    })));

    let mut graph = BlockGraph::new();
    let ids = [graph.add_block(b), graph.add_block(b2), graph.add_block(b3)];
    let host = RtlBackwalkHost::new(graph, program());

    for id in &ids[..2] {
        let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
        assert!(slicer.start(host.block(*id).unwrap()).unwrap());
        assert!(matches!(slicer.step(), Err(Error::Unsupported { .. })));
    }

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(matches!(
        slicer.start(host.block(ids[2]).unwrap()),
        Err(Error::Unsupported { .. })
    ));
}

#[test]
fn test_no_predecessors_ends_walk() -> Result<()> {
    let m = RtlEmitter::new();
    let mut b = block(0x100);
    b.emit(|e| e.goto(m.iadd(reg(1), 0x0012_3400)));
    let mut graph = BlockGraph::new();
    let id = graph.add_block(b);
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(id).unwrap())?);
    assert!(slicer.step()?);
    assert!(!slicer.step()?);
    assert!(slicer.jump_table_index_interval().is_empty());
    assert_eq!(live_names(&slicer), "r1");
    Ok(())
}

#[test]
fn test_self_loop_visited_once() -> Result<()> {
    let (r1, r3) = (reg(1), reg(3));
    let m = RtlEmitter::new();
    let mut looping = block(0x100);
    looping.emit(|e| e.assign(r3.clone(), m.iadd(r3.clone(), 1)));
    looping.emit(|e| e.branch(m.test(ConditionCode::Ne, cc("Z")), Address::ptr32(0x100)));
    let mut jump = block(0x200);
    jump.emit(|e| e.goto(m.iadd(r1.clone(), 0x0012_3400)));

    let mut graph = BlockGraph::new();
    let looping = graph.add_block(looping);
    let jump = graph.add_block(jump);
    graph.add_edge(looping, looping)?;
    graph.add_edge(looping, jump)?;
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(jump).unwrap())?);
    let mut steps = 0;
    while slicer.step()? {
        steps += 1;
        assert!(steps < 10, "walk did not terminate");
    }
    assert_eq!(
        slicer.jump_table_format().unwrap().to_string(),
        "r1 + 0x00123400"
    );
    Ok(())
}

#[test]
fn test_each_predecessor_is_explored() -> Result<()> {
    let (r1, r2, r3) = (reg(1), reg(2), reg(3));
    let m = RtlEmitter::new();
    let mut a = block(0x100);
    a.emit(|e| e.assign(r1.clone(), m.and(r2.clone(), 3)));
    let mut b = block(0x180);
    b.emit(|e| e.assign(r1.clone(), m.and(r3.clone(), 7)));
    let mut jump = block(0x200);
    jump.emit(|e| e.goto(m.mem32(m.iadd(m.imul(r1.clone(), 4), 0x0012_3400))));

    let mut graph = BlockGraph::new();
    let a = graph.add_block(a);
    let b = graph.add_block(b);
    let jump = graph.add_block(jump);
    graph.add_edge(a, jump)?;
    graph.add_edge(b, jump)?;
    let host = RtlBackwalkHost::new(graph, program());

    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    assert!(slicer.start(host.block(jump).unwrap())?);

    assert!(!slicer.step()?);
    assert_eq!(slicer.state().unwrap().block().name(), "l00000100");
    assert_eq!(slicer.jump_table_index(), Some(&Expression::from(r2)));
    assert_eq!(
        slicer.jump_table_index_interval(),
        StridedInterval::create(1, 0, 3)?
    );
    assert!(slicer.has_pending());

    assert!(!slicer.step()?);
    assert_eq!(slicer.state().unwrap().block().name(), "l00000180");
    assert_eq!(slicer.jump_table_index(), Some(&Expression::from(r3)));
    assert_eq!(
        slicer.jump_table_index_interval(),
        StridedInterval::create(1, 0, 7)?
    );
    assert!(!slicer.has_pending());

    assert!(!slicer.step()?);
    Ok(())
}

#[test]
fn test_slicing_is_deterministic() -> Result<()> {
    let run = || -> Result<(String, StridedInterval, String)> {
        let (graph, jump) = range_check_graph(ConditionCode::Ule, 0x200);
        let host = RtlBackwalkHost::new(graph, program());
        let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
        slicer.start(host.block(jump).unwrap())?;
        while slicer.step()? {}
        Ok((
            slicer.jump_table_format().unwrap().to_string(),
            slicer.jump_table_index_interval(),
            slicer.state().unwrap().dump_live(),
        ))
    };

    let first = run()?;
    assert_eq!(first, run()?);

    // Restarting the same slicer discards the previous walk.
    let (graph, jump) = range_check_graph(ConditionCode::Ule, 0x200);
    let host = RtlBackwalkHost::new(graph, program());
    let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
    for _ in 0..2 {
        assert!(slicer.start(host.block(jump).unwrap())?);
        while slicer.step()? {}
        assert_eq!(slicer.jump_table_format().unwrap().to_string(), first.0);
        assert_eq!(slicer.jump_table_index_interval(), first.1);
    }
    Ok(())
}
