//! Scatter/gather tests: thread-count invariance and the round-robin
//! multiplexing contract.

use pretty_assertions::assert_eq;
use tab::{run_expression, Options};

fn opts(threads: usize) -> Options {
    Options {
        threads,
        sorted: true,
        seed: 1,
        debug: 0,
    }
}

fn numbered_lines(n: usize) -> String {
    let mut input = String::new();
    for i in 0..n {
        input.push_str(&format!("line {:04} end\n", 1000 + i));
    }
    input
}

#[test]
fn counting_scatter_with_summing_gather() {
    let input = numbered_lines(1000);
    let expr = "count.:[ grep(@, \"[0-9]{4}\") ] --> sum.@";
    for threads in [1, 4] {
        assert_eq!(
            run_expression(expr, &input, &opts(threads)).unwrap(),
            "1000\n",
            "with {threads} threads"
        );
    }
}

#[test]
fn map_merge_is_thread_count_invariant() {
    let input = "a a b\nb c\na\nc c c\n".repeat(50);
    let expr = "{ @ -> sum.1 : :[ grep(@, \"\\\\S+\") ] } --> merge(@)";
    let single = run_expression(expr, &input, &opts(1)).unwrap();
    let threaded = run_expression(expr, &input, &opts(4)).unwrap();
    assert_eq!(single, threaded);
    assert_eq!(single, "a\t150\nb\t100\nc\t200\n");
}

#[test]
fn non_sequence_worker_results_arrive_as_single_elements() {
    let input = numbered_lines(10);
    let got = run_expression("count(@) --> sum.@", &input, &opts(3)).unwrap();
    assert_eq!(got, "10\n");
}

#[test]
fn threaded_output_collects_every_line() {
    let input = numbered_lines(100);
    // order across workers is unspecified; compare as a sorted set
    let got = run_expression("[ grep(@, \"[0-9]{4}\") ]", &input, &opts(4)).unwrap();
    let mut lines: Vec<&str> = got.lines().collect();
    lines.sort_unstable();
    let expected: Vec<String> = (0..100).map(|i| format!("{}", 1000 + i)).collect();
    assert_eq!(lines, expected);
}
