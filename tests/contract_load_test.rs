//! Integration tests for contract loading
//!
//! These tests verify the complete loading pipeline:
//! Annotated source -> block extraction -> parsing -> registry -> compiled automata

use tracecheck::parser::grammar::{parse_contract, split_blocks};
use tracecheck::workflow::engine::load_contracts;
use tracecheck::{Error, Registry};

/// A header file with contracts wrapped in annotation comments, surrounded
/// by ordinary declarations and comments
const ANNOTATED_HEADER: &str = "\
/* memory allocation API */\n\
void *malloc(size_t size);\n\
/*@ malloc(path):\n\
    Post (ret=0, \u{1D750}) \\/ (!(ret=0), malloc(ret))\n\
    Future (ret=0, (!_(ret))^*) \\/ (!(ret=0), (!free(ret))^* \u{00B7} free(ret) \u{00B7} (_)^*)\n\
@*/\n\
void free(void *p);\n\
/*@ free(handler):\n\
    Post (TRUE, free(handler))\n\
    Future (TRUE, (!_(handler))^* \u{00B7} (\u{1D750} \\/ (malloc(handler) \u{00B7} (_)^*)))\n\
@*/\n";

#[test]
fn test_annotation_comments_extracted() {
    let blocks = split_blocks(ANNOTATED_HEADER);
    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].text.contains("malloc(path):"));
    assert!(blocks[1].text.contains("free(handler):"));
    // Ordinary comments and declarations are not contract blocks
    assert!(!blocks[0].text.contains("memory allocation"));
}

#[test]
fn test_full_load_compiles_automata() {
    let registry = load_contracts(ANNOTATED_HEADER).unwrap();
    assert_eq!(registry.len(), 2);
    assert!(registry.diagnostics().is_empty());

    let malloc = registry.lookup("malloc", 1).unwrap();
    assert_eq!(malloc.post.len(), 2);
    assert_eq!(malloc.future.len(), 2);
    for branch in &malloc.future {
        assert!(branch.dfa.is_some(), "future branch left uncompiled");
    }

    let alphabet = registry.alphabet();
    assert!(alphabet.contains("malloc"));
    assert!(alphabet.contains("free"));
    assert_eq!(alphabet.len(), 2);
}

#[test]
fn test_parse_error_reports_source_location() {
    // Block starts at line 3 of the annotated file; the error inside it
    // must be located in file coordinates, not block coordinates
    let text = "\
int x;\n\
/*@ malloc(path):\n\
    Post (TRUE \u{1D750})\n\
@*/\n";
    let blocks = split_blocks(text);
    assert_eq!(blocks.len(), 1);
    let err = parse_contract(&blocks[0]).unwrap_err();
    match err {
        Error::Parse { line, .. } => assert_eq!(line, 3),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn test_reregistration_is_idempotent() {
    let blocks = split_blocks(ANNOTATED_HEADER);
    let mut registry = Registry::new();
    let first = parse_contract(&blocks[0]).unwrap();
    let again = parse_contract(&blocks[0]).unwrap();
    registry.register(first).unwrap();
    // Byte-identical contract text: a no-op, not a conflict
    registry.register(again).unwrap();
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_conflicting_redefinition_rejected() {
    let mut registry = Registry::new();
    let a = parse_contract(&split_blocks("malloc(n):\n    Post (TRUE, \u{1D750})\n")[0]).unwrap();
    let b =
        parse_contract(&split_blocks("malloc(n):\n    Post (TRUE, malloc(ret))\n")[0]).unwrap();
    registry.register(a).unwrap();
    match registry.register(b) {
        Err(Error::DuplicateContract(name)) => assert!(name.contains("malloc")),
        other => panic!("expected duplicate error, got {:?}", other),
    }
}

#[test]
fn test_same_name_different_arity_coexist() {
    let mut registry = Registry::new();
    let one = parse_contract(&split_blocks("open(path):\n    Post (TRUE, \u{1D750})\n")[0]).unwrap();
    let two =
        parse_contract(&split_blocks("open(path, mode):\n    Post (TRUE, \u{1D750})\n")[0]).unwrap();
    registry.register(one).unwrap();
    registry.register(two).unwrap();
    assert_eq!(registry.len(), 2);
    assert!(registry.lookup("open", 1).is_some());
    assert!(registry.lookup("open", 2).is_some());
    assert!(registry.lookup("open", 3).is_none());
}

#[test]
fn test_overlapping_guards_rejected() {
    // Both guards hold when ret=0 but the effects differ
    let text = "\
malloc(n):\n\
    Post (TRUE, malloc(ret)) \\/ (ret=0, \u{1D750})\n";
    let contract = parse_contract(&split_blocks(text)[0]).unwrap();
    let mut registry = Registry::new();
    match registry.register(contract) {
        Err(Error::AmbiguousGuards { contract, .. }) => assert_eq!(contract, "malloc"),
        other => panic!("expected ambiguity error, got {:?}", other),
    }
}

#[test]
fn test_undeclared_future_event_drops_contract() {
    // `close` is never declared by any Post effect, so the future
    // expression cannot be compiled against the alphabet
    let text = "\
open(path):\n\
    Post (TRUE, open(ret))\n\
    Future (TRUE, (!close(ret))^* \u{00B7} close(ret))\n";
    let registry = load_contracts(text).unwrap();
    assert_eq!(registry.len(), 0);
    assert_eq!(registry.diagnostics().len(), 1);
    assert!(registry.diagnostics()[0].message.contains("close"));
}

#[test]
fn test_bare_blocks_without_comment_framing() {
    // Contract files may also be plain blocks separated by header lines
    let text = "\
malloc(n):\n\
    Post (TRUE, malloc(ret))\n\
free(p):\n\
    Post (TRUE, free(p))\n";
    let registry = load_contracts(text).unwrap();
    assert_eq!(registry.len(), 2);
}
