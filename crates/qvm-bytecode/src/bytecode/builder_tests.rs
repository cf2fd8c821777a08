//! Tests for the image builder.

use super::*;

#[test]
fn labels_resolve_forward_and_backward() {
    let mut code = CodeBuilder::new();
    let top = code.new_label();
    let exit = code.new_label();

    code.bind(top).unwrap();
    code.op(Opcode::Local, 8).bare(Opcode::Load4);
    code.op(Opcode::Const, 0);
    code.to_label(Opcode::Eq, exit);
    code.to_label(Opcode::Const, top).bare(Opcode::Jump);
    code.bind(exit).unwrap();
    code.bare(Opcode::Push);

    let instructions = code.finish().unwrap();
    assert_eq!(instructions[3], Instruction::new(Opcode::Eq, 6));
    assert_eq!(instructions[4], Instruction::new(Opcode::Const, 0));
}

#[test]
fn unbound_label_is_an_error() {
    let mut code = CodeBuilder::new();
    let nowhere = code.new_label();
    code.to_label(Opcode::Ne, nowhere);

    assert_eq!(code.finish().unwrap_err(), BuildError::UnboundLabel(0));
}

#[test]
fn label_bound_twice() {
    let mut code = CodeBuilder::new();
    let l = code.new_label();
    code.bind(l).unwrap();

    assert_eq!(code.bind(l).unwrap_err(), BuildError::LabelRebound(0));
}

#[test]
fn image_layout() {
    let image = ImageBuilder::new(vec![Instruction::bare(Opcode::Push)])
        .literals(b"abcde")
        .words(&[1])
        .bss(16)
        .build()
        .unwrap();

    let header = Header::from_bytes(&image, ByteOrder::Little);
    assert_eq!(header.instruction_count, 1);
    assert_eq!(header.code_length, 1);
    assert_eq!(header.data_offset, 36);
    assert_eq!(header.lit_length, 8);
    assert_eq!(header.data_length, 12);
    assert_eq!(header.bss_length, 16);
    assert_eq!(image.len(), 48);
    assert_eq!(&image[36..44], b"abcde\0\0\0");
}

#[test]
fn raw_code_kept_verbatim() {
    let image = ImageBuilder::from_code_bytes(vec![0xEE, 0xEE], 5)
        .byte_order(ByteOrder::Big)
        .build()
        .unwrap();

    let header = Header::from_bytes(&image, ByteOrder::Big);
    assert_eq!(header.instruction_count, 5);
    assert_eq!(&image[32..34], &[0xEE, 0xEE]);
}
