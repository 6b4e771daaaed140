//! The help topic table consumed by the CLI's `-h` flag.

/// Returns the text for a topic, if it exists.
#[must_use]
pub fn topic(name: &str) -> Option<&'static str> {
    TOPICS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, text)| *text)
}

/// Every topic name, in listing order.
#[must_use]
pub fn topics() -> Vec<&'static str> {
    std::iter::once("functions")
        .chain(TOPICS.iter().map(|(n, _)| *n))
        .collect()
}

/// The names of every registered builtin, for the `functions` topic.
#[must_use]
pub fn function_names() -> Vec<&'static str> {
    let mut names = crate::registry::registry().names().to_vec();
    names.sort_unstable();
    names
}

static TOPICS: &[(&str, &str)] = &[
    (
        "overview",
        "There are four atomic types:

- Int, a signed 64-bit integer.
- UInt, an unsigned 64-bit integer.
- Real, an IEEE-754 double.
- String, a string stored as a byte array.

And four structured types: tuples (fixed-size, mixed element types),
arrays (variable-size, one element type), maps (hashed, one key and one
value type) and sequences (lazy, single-pass streams of one element
type). The input is bound to '@' as a sequence of lines; the value of
the expression is printed to standard output.",
    ),
    (
        "syntax",
        "Literals:
 UInt:     1234 or 1234u or 0x4D2
 Int:      -1234 or 1234i or 1234s or 1234l
 Real:     +10.50 or 1. or 4.4e-10
 String:   'chars' or \"chars\"    escapes: \\t \\n \\r \\e \\\\
 Sequence: [ expr ] or [ expr : source ]          also [ try ... ]
 Array:    [. expr .] or [. expr : source .]
 Map:      { key } or { key -> val } or { key -> val : source }
 Accumulator: << body : init, source >>

Function calls: f(x) or f.x   Variables: x = expr
Operators, loosest first: ~ (regex) ; & | ^ ; + - ; * / % ; ** ;
! ~ : ? (prefix) ; a[b] and a~b (indexing, tightest).
Use ',' or ';' to separate expressions.",
    ),
    (
        "examples",
        "Count lines:                  count(@)
Numbered lines:               zip(count(), @)
All numbers in the input:     [ grep(@, \"[0-9]+\") ]
Word frequencies:             { @ -> sum.1 : :[ grep(@, \"\\\\S+\") ] }
Sum one number per line:      sum.[ real(@) ]
Threaded word count:          count.:[ grep(@, \"\\\\S+\") ] --> sum.@",
    ),
    (
        "threads",
        "With '-t N' the part of the expression before '-->' (the scatter)
runs on N worker threads, each consuming lines from the shared input.
The part after '-->' (the gather) runs once, with '@' bound to the
round-robin multiplexed stream of worker outputs. Without '-->' the
gather defaults to '@'. No ordering is guaranteed across workers.",
    ),
    ("abs", "abs Int -> Int\nabs Real -> Real"),
    ("and", "and (Integer, Integer, ...) -> UInt"),
    (
        "array",
        "array Seq[a] -> Arr[a]\narray Map[a,b] -> Arr[(a,b)]\narray a -> Arr[a]",
    ),
    ("avg", "Synonym for 'mean'."),
    ("bytes", "bytes String -> Arr[UInt]"),
    (
        "case",
        "case a, a,b, ..., b -> b\nCompares the subject with each check value, returning the paired\nresult; the last argument is the default.",
    ),
    ("cat", "cat String, ... -> String"),
    ("ceil", "ceil Real -> Real"),
    ("cos", "cos Number -> Real"),
    (
        "count",
        "count Seq[a]|Arr[a]|Map[a,b]|String -> UInt\ncount -> Seq[UInt]   an endless counter from 1\ncount UInt -> Seq[UInt]   1 through n",
    ),
    (
        "cut",
        "cut String, String -> Arr[String]\ncut String, String, UInt -> String\ncut Seq[String], String -> Seq[Arr[String]]",
    ),
    ("date", "date Int -> String   (UTC, '1970-01-01')"),
    ("datetime", "datetime Int -> String   (UTC, '1970-01-01 00:00:00')"),
    ("e", "e -> Real"),
    ("eq", "eq a, a, ... -> UInt   1 when every argument equals the first"),
    ("exp", "exp Number -> Real"),
    (
        "filter",
        "filter Seq[(Integer, a...)] -> Seq[(a...)]\nKeeps elements whose first member is nonzero, dropping the flag.\nAlso written '?a'.",
    ),
    (
        "first",
        "first (a,b) -> a\nfirst Seq[(a,b)] -> Seq[a]\nfirst Map[a,b] -> Seq[a]",
    ),
    (
        "flatten",
        "flatten Seq[Seq[a]]|Seq[Arr[a]] -> Seq[a]\nflatten Seq[Map[a,b]] -> Seq[(a,b)]\nAlso written ':a'.",
    ),
    (
        "flip",
        "flip Map[a,b] -> Seq[(b,a)]\nflip Seq[(a,b)] -> Seq[(b,a)]",
    ),
    ("floor", "floor Real -> Real"),
    (
        "get",
        "get Map[a,b], a, b -> b\nget Arr[a], UInt, a -> a\nLike indexing, but returns the third argument instead of failing.",
    ),
    ("glue", "glue a, Seq[a] -> Seq[a]   prepends one element"),
    ("gmtime", "gmtime Int -> (Int,Int,Int,Int,Int,Int)   (y,m,d,h,m,s in UTC)"),
    ("grep", "grep String, String -> Arr[String]   all regex matches"),
    (
        "grepif",
        "grepif String, String -> UInt\ngrepif Seq[String], String -> Seq[String]   keeps matching strings",
    ),
    ("has", "has Map[a,b], a -> UInt"),
    ("hash", "hash a -> UInt   a structural hash, stable within a build"),
    ("head", "head Seq[a]|Arr[a], UInt -> Seq[a]"),
    ("hex", "hex UInt -> UInt   marks the value to print as 0x..."),
    (
        "iarray",
        "iarray Seq[a] -> Arr[a]\nLike 'array', but prints ';'-separated on one line.",
    ),
    (
        "if",
        "if Integer, a, a -> a\nReturns the second argument when the first is nonzero.",
    ),
    (
        "index",
        "index Arr[a], Number -> a\nindex Map[a,b], a -> b\nindex String|Arr[a], Integer, Integer -> String|Arr[a]   (inclusive slice)\nAlso written a[b] or a~b.",
    ),
    (
        "int",
        "int String -> Int\nint String, Integer -> Int   (default on conversion failure)\nint Real|UInt -> Int",
    ),
    ("join", "join Arr[String]|Seq[String], String -> String"),
    (
        "lines",
        "lines (a, b, ...) -> (a, b, ...)\nReturns its arguments unchanged, marked to print one member per\nline instead of tab-separated.",
    ),
    ("log", "log Number -> Real"),
    ("lsh", "lsh Int|UInt, Integer -> Int|UInt   negative amounts shift right"),
    (
        "map",
        "map Seq[(a,b)] -> Map[a,b]\nmap (a,b) -> Map[a,b]",
    ),
    ("max", "max Seq[a]|Arr[a] -> a\nmax Number -> Number   (marks map values for max-merge)"),
    ("mean", "mean Seq[Number]|Arr[Number] -> Real\nmean Number -> Real"),
    (
        "merge",
        "merge Seq[a] -> a\nAggregates a sequence: maps merge, arrays concatenate, numbers add.",
    ),
    ("min", "min Seq[a]|Arr[a] -> a\nmin Number -> Number   (marks map values for min-merge)"),
    ("ngrams", "ngrams Seq[a], UInt -> Seq[Arr[a]]   sliding windows"),
    ("normal", "normal -> Real\nnormal Real, Real -> Real   (mean, deviation)"),
    ("now", "now -> Int   unix time in seconds"),
    ("pairs", "pairs Seq[a] -> Seq[(a,a)]   sliding windows of two"),
    ("peek", "peek Seq[a] -> (a, Seq[a])   the first element, not consumed"),
    ("pi", "pi -> Real"),
    (
        "rand",
        "rand -> Real   uniform in [0, 1)\nrand Real, Real -> Real\nrand UInt, UInt -> UInt\nrand Int, Int -> Int",
    ),
    (
        "real",
        "real String -> Real\nreal String, Real -> Real   (default on conversion failure)\nreal Int|UInt -> Real",
    ),
    ("recut", "recut String, String -> Arr[String]   split on a regex\nrecut String, String, UInt -> String"),
    ("replace", "replace String, String, String -> String   regex replacement"),
    ("reverse", "reverse Arr[a] -> Arr[a]"),
    ("round", "round Real -> Real"),
    ("rsh", "rsh Int|UInt, Integer -> Int|UInt   negative amounts shift left"),
    ("sample", "sample UInt, Seq[a] -> Arr[a]   reservoir sample of n elements"),
    (
        "second",
        "second (a,b) -> b\nsecond Seq[(a,b)] -> Seq[b]\nsecond Map[a,b] -> Seq[b]",
    ),
    (
        "seq",
        "seq Seq[a]|Arr[a] -> Seq[a]\nseq Map[a,b] -> Seq[(a,b)]\nseq a -> Seq[a]",
    ),
    ("sin", "sin Number -> Real"),
    ("skip", "skip Seq[a]|Arr[a], UInt -> Seq[a]"),
    (
        "sort",
        "sort Seq[a]|Arr[a] -> Arr[a]\nsort Map[a,b] -> Arr[(a,b)]   sorted by key",
    ),
    ("sqrt", "sqrt Number -> Real"),
    ("stdev", "stdev Seq[Number]|Arr[Number] -> Real\nAlso 'stddev'."),
    ("stddev", "Synonym for 'stdev'."),
    (
        "string",
        "string Arr[UInt] -> String   bytes to string, values must be < 256\nstring Int|UInt|Real -> String",
    ),
    ("stripe", "stripe Seq[a]|Arr[a], UInt -> Seq[a]   every n-th element"),
    (
        "sum",
        "sum Seq[Number]|Arr[Number] -> Number\nsum Number -> Number   (marks map values for sum-merge)",
    ),
    ("tabulate", "A synonym for 'seq'."),
    (
        "take",
        "take Seq[a] -> a   errors on an empty sequence\ntake Seq[a], a -> a   returns the default instead",
    ),
    ("tan", "tan Number -> Real"),
    ("time", "time Int -> String   (UTC, '00:00:00')"),
    ("tolower", "tolower String -> String   ASCII only"),
    ("toupper", "toupper String -> String   ASCII only"),
    ("triplets", "triplets Seq[a] -> Seq[(a,a,a)]   sliding windows of three"),
    ("tuple", "tuple (a, b, ...) -> (a, b, ...)"),
    ("uniques", "uniques Seq[a]|Arr[a]|Map[a,b] -> UInt   distinct elements"),
    ("var", "var Seq[Number]|Arr[Number] -> Real\nAlso 'variance'."),
    ("variance", "Synonym for 'var'."),
    (
        "while",
        "while Seq[(Integer, a...)] -> Seq[(a...)]\nLike 'filter', but ends the sequence at the first zero flag.",
    ),
    ("zip", "zip Seq[a], Seq[b], ... -> Seq[(a,b,...)]   ends with the shortest"),
    ("or", "or (Integer, Integer, ...) -> UInt"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_topics_exist() {
        for t in ["overview", "syntax", "examples", "threads"] {
            assert!(topic(t).is_some(), "missing topic {t}");
        }
        assert!(topic("grep").is_some());
        assert!(topic("no_such_topic").is_none());
    }

    #[test]
    fn every_registered_builtin_has_a_topic() {
        for name in crate::registry::registry().names() {
            assert!(topic(name).is_some(), "no help for builtin {name}");
        }
    }
}
