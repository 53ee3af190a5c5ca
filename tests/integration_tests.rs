// End-to-end tests for script compilation and execution through the Service

use countdb::{Error, MemoryStorage, Options, ScriptRequest, Service};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Builds an instruction header word: op, cmp, target kind, operand kind.
fn header(op: u8, cmp: u8, target_kind: u8, operand_kind: u8) -> u16 {
    (op as u16) << 12 | (cmp as u16) << 8 | (target_kind as u16) << 4 | operand_kind as u16
}

// Value kinds
const ZERO: u8 = 0;
const NAME: u8 = 1;
const IMM16S: u8 = 2;
const IMM16U: u8 = 3;
const IMM32U: u8 = 5;
const IMM64S: u8 = 6;

// Ops
const SET: u8 = 0;
const INC: u8 = 1;
const DEC: u8 = 2;
const ADD: u8 = 3;
const SUB: u8 = 4;

// Cmps
const EQ: u8 = 0;
const NEQ: u8 = 1;
const LT: u8 = 2;
const GT: u8 = 3;
const LE: u8 = 4;
const GE: u8 = 5;
const ALWAYS: u8 = 0xF;

fn open_service(dir: &TempDir) -> Service {
    let _ = env_logger::builder().is_test(true).try_init();
    let options = Options::default().flush_interval(Duration::from_millis(10));
    Service::open(dir.path(), options, Arc::new(MemoryStorage::new())).unwrap()
}

fn request(names: &[&str], code: Vec<u16>) -> ScriptRequest {
    ScriptRequest { names: names.iter().map(|s| s.to_string()).collect(), code }
}

/// Reads a counter's current value: reserved op (identity), unconditional.
fn read(service: &Service, name: &str) -> i64 {
    let req = request(&[name], vec![header(0xF, ALWAYS, NAME, ZERO), 0]);
    service.process(&req).unwrap().results[0]
}

#[test]
fn test_compare_and_increment_end_to_end() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);

    // cache[c] = 5
    let seed = request(&["c"], vec![header(SET, ALWAYS, NAME, IMM16U), 0, 5]);
    service.process(&seed).unwrap();

    // INC c if c == 5
    let inc_if_5 = request(&["c"], vec![header(INC, EQ, NAME, IMM16U), 0, 5]);
    assert_eq!(service.process(&inc_if_5).unwrap().results, vec![6]);
    assert_eq!(read(&service, "c"), 6);

    // Same program again: the guard fails now, value stays 6.
    assert_eq!(service.process(&inc_if_5).unwrap().results, vec![6]);
    assert_eq!(read(&service, "c"), 6);
}

#[test]
fn test_one_result_per_instruction() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);

    // Five instructions of varying operand widths.
    let code = vec![
        header(SET, ALWAYS, NAME, IMM16U), 0, 100,
        header(ADD, ALWAYS, NAME, IMM32U), 0, 0x0001, 0x0000, // +65536
        header(SUB, ALWAYS, NAME, IMM16S), 0, 0xFFFF,         // -(-1)
        header(INC, ALWAYS, NAME, ZERO), 0,
        header(DEC, ALWAYS, NAME, IMM64S), 0, 0, 0, 0, 0,
    ];
    let results = service.process(&request(&["c"], code)).unwrap().results;
    assert_eq!(results, vec![100, 65636, 65637, 65638, 65637]);
}

#[test]
fn test_guard_table_through_bytecode() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);

    // For each cmp: set c = 5, then SET c, 1 if cmp(5, 5) holds.
    let cases = [
        (EQ, true),
        (NEQ, false),
        (LT, false),
        (GT, false),
        (LE, true),
        (GE, true),
        (7, true), // reserved comparison code: unconditional
    ];
    for (cmp, holds) in cases {
        let code = vec![
            header(SET, ALWAYS, NAME, IMM16U), 0, 5,
            header(SET, cmp, NAME, IMM16U), 0, 1,
        ];
        let results = service.process(&request(&["c"], code)).unwrap().results;
        let expected = if holds { 1 } else { 5 };
        assert_eq!(results[1], expected, "cmp code {}", cmp);
    }
}

#[test]
fn test_op_table_through_bytecode() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);

    // Each case starts from c = 10 and applies op with operand 4.
    let cases = [(SET, 4), (INC, 11), (DEC, 9), (ADD, 14), (SUB, 6), (9, 10)];
    for (op, expected) in cases {
        let code = vec![
            header(SET, ALWAYS, NAME, IMM16U), 0, 10,
            header(op, ALWAYS, NAME, IMM16U), 0, 4,
        ];
        let results = service.process(&request(&["c"], code)).unwrap().results;
        assert_eq!(results[1], expected, "op code {}", op);
    }
}

#[test]
fn test_intra_script_dependency_across_counters() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);

    // a = 3; b = a; b += a → b observes the write from instruction 2.
    let code = vec![
        header(SET, ALWAYS, NAME, IMM16U), 0, 3,
        header(SET, ALWAYS, NAME, NAME), 1, 0,
        header(ADD, ALWAYS, NAME, NAME), 1, 0,
    ];
    let results = service.process(&request(&["a", "b"], code)).unwrap().results;
    assert_eq!(results, vec![3, 3, 6]);
}

#[test]
fn test_incomplete_encoding_rejected() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);

    // NAME operand promised, no word follows.
    let req = request(&["c"], vec![header(SET, ALWAYS, NAME, NAME), 0]);
    let err = service.process(&req).unwrap_err();
    assert!(matches!(err, Error::IncompleteEncoding(_)));
}

#[test]
fn test_invalid_target_rejected() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);

    let req = request(&["c"], vec![header(SET, ALWAYS, IMM16U, ZERO), 5]);
    let err = service.process(&req).unwrap_err();
    assert!(matches!(err, Error::InvalidTarget(_)));
}

#[test]
fn test_index_out_of_range_rejected() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);

    let req = request(&["c"], vec![header(SET, ALWAYS, NAME, ZERO), 1]);
    let err = service.process(&req).unwrap_err();
    assert!(matches!(err, Error::IndexOutOfRange { index: 1, len: 1 }));
}

#[test]
fn test_compile_failure_mutates_nothing() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);

    // A valid INC followed by a truncated instruction: the whole script is
    // rejected and the first instruction must not have run.
    let code = vec![
        header(INC, ALWAYS, NAME, ZERO), 0,
        header(SET, ALWAYS, NAME, NAME), 0,
    ];
    assert!(service.process(&request(&["c"], code)).is_err());
    assert_eq!(read(&service, "c"), 0);
}

#[test]
fn test_empty_script_returns_no_results() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);

    let results = service.process(&request(&[], vec![])).unwrap().results;
    assert!(results.is_empty());
}

#[test]
fn test_same_name_resolves_to_same_counter() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);

    // The same name listed twice: both indices hit the same slot.
    let code = vec![
        header(SET, ALWAYS, NAME, IMM16U), 0, 21,
        header(ADD, ALWAYS, NAME, NAME), 1, 0,
    ];
    let results = service.process(&request(&["c", "c"], code)).unwrap().results;
    assert_eq!(results, vec![21, 42]);
}
