//! End-to-end expression tests: source text in, printed bytes out.

use pretty_assertions::assert_eq;
use tab::{run_expression, Options};

fn eval(src: &str, input: &str) -> String {
    run_expression(src, input, &Options::default()).unwrap()
}

fn eval_sorted(src: &str, input: &str) -> String {
    let opts = Options {
        sorted: true,
        ..Options::default()
    };
    run_expression(src, input, &opts).unwrap()
}

#[test]
fn identity_echoes_the_input() {
    assert_eq!(eval("@", "ab\ncd\n"), "ab\ncd\n");
}

#[test]
fn count_lines() {
    assert_eq!(eval("count(@)", "a\nb\nc\n"), "3\n");
}

#[test]
fn grep_comprehension() {
    assert_eq!(eval("[ grep(@, \"[0-9]+\") ]", "a12 b\n c3\n"), "12\n3\n");
}

#[test]
fn zip_with_a_counter() {
    assert_eq!(eval("zip(count(), @)", "x\ny\n"), "1\tx\n2\ty\n");
}

#[test]
fn word_frequencies() {
    assert_eq!(
        eval_sorted("{ @ -> sum.1 : :[ grep(@, \"\\\\S+\") ] }", "a a b\n"),
        "a\t2\nb\t1\n"
    );
}

#[test]
fn literals_round_trip() {
    assert_eq!(eval("12345u", ""), "12345\n");
    assert_eq!(eval("-42", ""), "-42\n");
    assert_eq!(eval("0x4D2", ""), "1234\n");
    assert_eq!(eval("2.5", ""), "2.5\n");
    assert_eq!(eval("'raw bytes'", ""), "raw bytes\n");
}

#[test]
fn arithmetic_promotions() {
    assert_eq!(eval("2u + 3u", ""), "5\n");
    // SUB always widens to Int
    assert_eq!(eval("2u - 3u", ""), "-1\n");
    assert_eq!(eval("2 * 2.5", ""), "5.0\n");
    assert_eq!(eval("2 ** 10", ""), "1024.0\n");
    assert_eq!(eval("7u % 4u", ""), "3\n");
    assert_eq!(eval("6u & 3u", ""), "2\n");
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let err = run_expression("1u / 0u", "", &Options::default()).unwrap_err();
    assert!(err.to_string().contains("division by zero"));
}

#[test]
fn unary_operators() {
    assert_eq!(eval("!1", ""), "0\n");
    assert_eq!(eval("!0u", ""), "1\n");
    assert_eq!(eval("~0u", ""), format!("{}\n", u64::MAX));
}

#[test]
fn regex_match_operator() {
    assert_eq!(eval("\"a1b22\" ~ \"[0-9]+\"", ""), "1\n22\n");
}

#[test]
fn index_sugar_and_brackets() {
    assert_eq!(eval("x = array(@), x~0", "a\nb\n"), "a\n");
    assert_eq!(eval("x = array(@), x[1]", "a\nb\n"), "b\n");
    assert_eq!(eval("x = array(@), x[-1]", "a\nb\n"), "b\n");
    assert_eq!(eval("x = array(@), x[0.5]", "a\nb\nc\nd\n"), "c\n");
}

#[test]
fn out_of_bounds_indexing_fails() {
    let err = run_expression("x = array(@), x[9]", "a\n", &Options::default()).unwrap_err();
    assert!(err.to_string().contains("out of bounds"));
}

#[test]
fn map_lookup_and_defaults() {
    assert_eq!(eval("m = { @ -> sum.1 }, m[\"a\"]", "a\na\nb\n"), "2\n");
    assert_eq!(
        eval("m = { @ -> sum.1 }, get(m, \"z\", 0u)", "a\nb\n"),
        "0\n"
    );
    assert_eq!(eval("m = { @ -> sum.1 }, has(m, \"b\")", "a\nb\n"), "1\n");
    let err =
        run_expression("m = { @ -> sum.1 }, m[\"z\"]", "a\n", &Options::default()).unwrap_err();
    assert!(err.to_string().contains("not in map"));
}

#[test]
fn missing_overload_quotes_the_signature() {
    let err = run_expression("sum(@)", "a\n", &Options::default()).unwrap_err();
    assert!(err.to_string().contains("sum(Seq[String])"));
}

#[test]
fn undefined_variable_is_a_type_error() {
    let err = run_expression("nope + 1", "", &Options::default()).unwrap_err();
    assert!(err.to_string().contains("undefined variable"));
}

#[test]
fn unparsed_remainder_is_a_syntax_error() {
    let err = run_expression("1 + 2 }", "", &Options::default()).unwrap_err();
    assert!(err.to_string().contains("unparsed input"));
}

#[test]
fn head_of_an_endless_counter_terminates() {
    assert_eq!(eval("head(count(), 3)", ""), "1\n2\n3\n");
}

#[test]
fn skip_and_stripe() {
    assert_eq!(eval("skip(@, 2)", "a\nb\nc\nd\n"), "c\nd\n");
    assert_eq!(eval("stripe(@, 2)", "a\nb\nc\nd\n"), "a\nc\n");
}

#[test]
fn filter_sugar() {
    // keep lines containing a digit
    assert_eq!(
        eval("?[ tuple(grepif(@, \"[0-9]\"), @) ]", "a1\nbb\nc3\n"),
        "a1\nc3\n"
    );
}

#[test]
fn flatten_sugar() {
    assert_eq!(eval(":[ cut(@, \",\") ]", "a,b\nc\n"), "a\nb\nc\n");
}

#[test]
fn try_skips_failing_elements() {
    assert_eq!(eval("[ try uint(@) ]", "1\nx\n2\n"), "1\n2\n");
    let err = run_expression("[ uint(@) ]", "1\nx\n", &Options::default()).unwrap_err();
    assert!(err.to_string().contains("could not convert"));
}

#[test]
fn accumulator_folds_the_source() {
    assert_eq!(
        eval("<< first(@) + second(@) : 0u, [ uint(@) ] >>", "1\n2\n3\n"),
        "6\n"
    );
}

#[test]
fn string_functions() {
    assert_eq!(eval("tolower(\"AbC\")", ""), "abc\n");
    assert_eq!(eval("toupper(\"abc\")", ""), "ABC\n");
    assert_eq!(eval("cat(\"a\", \"b\", \"c\")", ""), "abc\n");
    assert_eq!(eval("join(cut(\"a,b,c\", \",\"), \"-\")", ""), "a-b-c\n");
    assert_eq!(eval("replace(\"a1b2\", \"[0-9]\", \"_\")", ""), "a_b_\n");
    assert_eq!(eval("cut(\"x:y:z\", \":\", 1)", ""), "y\n");
    assert_eq!(eval("string(bytes(\"hi\"))", ""), "hi\n");
}

#[test]
fn conversions_and_defaults() {
    assert_eq!(eval("[ int(@, -1) ]", "5\nx\n"), "5\n-1\n");
    assert_eq!(eval("real(\"2.5\")", ""), "2.5\n");
    assert_eq!(eval("uint(\"17\")", ""), "17\n");
}

#[test]
fn hex_printing() {
    assert_eq!(eval("hex(255u)", ""), "0xff\n");
    // hex values still behave as plain UInts in arithmetic
    assert_eq!(eval("hex(2u) + 1u", ""), "3\n");
}

#[test]
fn iarray_prints_inline() {
    assert_eq!(eval("[. uint(@) .]", "1\n2\n3\n"), "1;2;3\n");
}

#[test]
fn aggregates() {
    assert_eq!(eval("sum.[ uint(@) ]", "1\n2\n3\n"), "6\n");
    assert_eq!(eval("mean.[ real(@) ]", "1\n2\n3\n4\n"), "2.5\n");
    assert_eq!(eval("min.[ uint(@) ]", "5\n2\n9\n"), "2\n");
    assert_eq!(eval("max.[ uint(@) ]", "5\n2\n9\n"), "9\n");
    assert_eq!(eval("uniques([ @ ])", "a\nb\na\n"), "2\n");
}

#[test]
fn sort_orders_lines() {
    assert_eq!(eval("sort([ @ ])", "b\na\nc\n"), "a\nb\nc\n");
}

#[test]
fn control_functions() {
    assert_eq!(eval("if(1u, \"yes\", \"no\")", ""), "yes\n");
    assert_eq!(
        eval("case(2u, 1u,\"one\", 2u,\"two\", \"other\")", ""),
        "two\n"
    );
    assert_eq!(eval("eq(3u, 3u, 3u)", ""), "1\n");
    assert_eq!(eval("tuple(1u, \"x\")", ""), "1\tx\n");
}

#[test]
fn lines_prints_members_on_their_own_lines() {
    assert_eq!(eval("lines(1u, \"x\")", ""), "1\nx\n");
    assert_eq!(eval("lines(tuple(1u, \"x\"))", ""), "1\nx\n");
}

#[test]
fn assignments_bind_left_to_right() {
    assert_eq!(eval("a = 2u, b = 3u, a * b", ""), "6\n");
}

#[test]
fn pair_projections() {
    assert_eq!(eval("first(zip(count(), @))", "x\ny\n"), "1\n2\n");
    assert_eq!(eval("second(zip(count(), @))", "x\ny\n"), "x\ny\n");
}

#[test]
fn deterministic_across_runs_for_a_fixed_seed() {
    let opts = Options {
        seed: 99,
        ..Options::default()
    };
    let a = run_expression("[ rand(0u, 100u) : head(count(), 5) ]", "", &opts).unwrap();
    let b = run_expression("[ rand(0u, 100u) : head(count(), 5) ]", "", &opts).unwrap();
    assert_eq!(a, b);
}

#[test]
fn empty_sequence_literals_are_rejected() {
    assert!(run_expression("[ ]", "", &Options::default()).is_err());
}
