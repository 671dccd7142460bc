//! Structural properties: print/parse round-trips, precedence against a
//! reference evaluation, deterministic output, and shared-template
//! concurrency.

use serde_json::json;
use tsumugi::Environment;

/// Printing a parsed tree and re-parsing the output must reach a fixed
/// point after one step.
#[test]
fn print_parse_round_trip() {
    let env = Environment::new();
    let sources = [
        "Hello, World",
        "{{ name }}",
        "{{ 1 + 2 * 3 + 4 }}",
        "{{ (1 + 2) * (3 - 4) }}",
        "{{ a - b - c }}",
        "{{ -x * +y }}",
        "{{ not a and b or c }}",
        "{{ a == b }}",
        "{{ {\"k\": [1, 2.5, true], other: {}} }}",
        "{{ items[0].name }}",
        "text {% if a %}x{% elif b %}y{% else %}z{% endif %} more",
        "{% for item in items %}{{ item }}{% endfor %}",
        "{% for (k, v) in pairs %}{{ k }}:{{ v }}{% endfor %}",
        "{% set x = \"a\\nb\" %}{{ x }}",
        "{% if x %}{{ 1.0 + 2 }}{% endif %}",
    ];
    for src in sources {
        let printed = env.parse(src, "t", "<t>").unwrap().to_string();
        let reprinted = env.parse(&printed, "t", "<t>").unwrap().to_string();
        assert_eq!(printed, reprinted, "round trip diverged for {:?}", src);
    }
}

/// Arithmetic templates must agree with the reference results computed by
/// ordinary precedence rules.
#[test]
fn precedence_against_reference_results() {
    let cases = [
        ("{{ 1 + 2 * 3 + 4 }}", "11"),
        ("{{ 2 * 3 + 4 * 5 }}", "26"),
        ("{{ 1 - 2 - 3 }}", "-4"),
        ("{{ 20 / 2 / 5 }}", "2"),
        ("{{ 7 % 4 + 1 }}", "4"),
        ("{{ 2 + 3 * 4 - 5 }}", "9"),
        ("{{ (2 + 3) * (4 - 5) }}", "-5"),
        ("{{ 100 - 10 * 5 // 2 }}", "75"),
    ];
    for (template, expected) in cases {
        let out = tsumugi::render(template, json!({})).unwrap();
        assert_eq!(out, expected, "for {:?}", template);
    }
}

#[test]
fn rendering_is_deterministic() {
    let env = Environment::new();
    let template = env
        .parse(
            "{% for k in m %}{{ k }}={{ m[k] }};{% endfor %}{{ a + b }}",
            "t",
            "<t>",
        )
        .unwrap();
    let data = json!({"m": {"one": 1, "two": 2, "three": 3}, "a": 2, "b": 3});
    let first = template.render(data.clone()).unwrap();
    for _ in 0..5 {
        assert_eq!(template.render(data.clone()).unwrap(), first);
    }
    assert_eq!(first, "one=1;two=2;three=3;5");
}

/// A parsed template is immutable; concurrent renders with independent
/// contexts must not interfere.
#[test]
fn one_template_renders_from_many_threads() {
    let env = Environment::new();
    let template = env
        .parse(
            "{% for i in items %}{{ prefix }}{{ i * i }};{% endfor %}",
            "t",
            "<t>",
        )
        .unwrap();

    std::thread::scope(|scope| {
        for thread_id in 0..8 {
            let template = &template;
            scope.spawn(move || {
                let expected = format!("t{0}1;t{0}4;t{0}9;", thread_id);
                for _ in 0..50 {
                    let out = template
                        .render(json!({
                            "items": [1, 2, 3],
                            "prefix": format!("t{}", thread_id),
                        }))
                        .unwrap();
                    assert_eq!(out, expected);
                }
            });
        }
    });
}

#[test]
fn strict_mode_is_per_environment() {
    let src = "[{{ missing }}]";
    let mut strict_env = Environment::new();
    strict_env.strict = true;
    let permissive = Environment::new().parse(src, "t", "<t>").unwrap();
    let strict = strict_env.parse(src, "t", "<t>").unwrap();

    assert_eq!(permissive.render(json!({})).unwrap(), "[]");
    let err = strict.render(json!({})).unwrap_err();
    assert!(err.to_string().contains("undefined variable 'missing'"));
}

#[test]
fn delimiter_balance_accepts_all_matched_nestings() {
    for src in [
        "{{ ([1, 2][0]) }}",
        "{{ {\"a\": [1, {\"b\": (2 + 3)}]} }}",
        "{{ ((((1)))) }}",
    ] {
        assert!(
            tsumugi::render(src, json!({})).is_ok(),
            "balanced template {:?} should parse",
            src
        );
    }
}

#[test]
fn mismatched_closers_fail_at_the_lexer_boundary() {
    for (src, fragment) in [
        ("{{ (] }}", "Imbalanced delimiters, expected ), got ]"),
        ("{{ [}] }}", "Imbalanced delimiters, expected ], got }"),
        ("{{ {) }}", "Imbalanced delimiters, expected }, got )"),
    ] {
        let err = tsumugi::render(src, json!({})).unwrap_err();
        assert!(
            err.to_string().contains(fragment),
            "for {:?} got {}",
            src,
            err
        );
    }
}
