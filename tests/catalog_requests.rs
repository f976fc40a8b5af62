use bspsim::catalog::{execute, Output, Request, Response, SortInput};
use bspsim::BspError;

fn run(json: &str) -> Result<Response, BspError> {
    let request: Request = serde_json::from_str(json).unwrap();
    execute(&request)
}

#[test]
fn prefix_sum_round_trip_as_json() {
    let response = run(r#"{"algorithm": "pram_prefix_sum", "a": [1, 2, 3, 4]}"#).unwrap();
    assert_eq!(
        serde_json::to_string(&response).unwrap(),
        r#"{"input":[[1,2,3,4]],"result":[1,3,6,10]}"#
    );
}

#[test]
fn sums_on_every_machine() {
    assert_eq!(
        run(r#"{"algorithm": "pram_sum", "a": [5, 6, 3, 13]}"#).unwrap().result,
        Output::Scalar(27)
    );
    assert_eq!(
        run(r#"{"algorithm": "pram_sum_optimal", "a": [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1]}"#)
            .unwrap()
            .result,
        Output::Scalar(16)
    );
    assert_eq!(
        run(r#"{"algorithm": "hypercube_sum", "a": [1, 2, 3, 4], "propagate": true}"#)
            .unwrap()
            .result,
        Output::Vector(vec![10; 4])
    );
    assert_eq!(
        run(r#"{"algorithm": "mesh_sum", "a": [1, 2, 3, 4, 5, 6, 7, 8, 9], "propagate": true}"#)
            .unwrap()
            .result,
        Output::Matrix(vec![vec![45; 3]; 3])
    );
    assert_eq!(
        run(r#"{"algorithm": "butterfly_sum", "k": 1, "a": [1, 2, 3, 4], "propagate": true}"#)
            .unwrap()
            .result,
        Output::Matrix(vec![vec![10, 10], vec![10, 10]])
    );
    assert_eq!(
        run(r#"{"algorithm": "shuffle_sum", "a": [2, 2, 2, 2, 2, 2, 2, 2]}"#)
            .unwrap()
            .result,
        Output::Vector(vec![16; 8])
    );
}

#[test]
fn matrix_products_agree() {
    let expected = Output::Matrix(vec![vec![9, 10], vec![13, 14]]);
    for algorithm in ["hypercube_matrix", "mesh_matrix"] {
        let json = format!(
            r#"{{"algorithm": "{algorithm}", "a": [[1, 2], [3, 4]], "b": [[-5, -6], [7, 8]]}}"#
        );
        assert_eq!(run(&json).unwrap().result, expected, "{algorithm}");
    }
}

#[test]
fn sorts_explicit_and_random_input() {
    let response = run(r#"{"algorithm": "hypercube_bitonic", "a": [3, -1, 8, 0]}"#).unwrap();
    assert_eq!(response.result, Output::Vector(vec![-1, 0, 3, 8]));

    let response = execute(&Request::TournamentErew {
        a: SortInput::Random { random: 8, seed: 5 },
    })
    .unwrap();
    let input = match &response.input[0] {
        Output::Vector(values) => values.clone(),
        other => panic!("unexpected input {other:?}"),
    };
    let mut sorted = input.clone();
    sorted.sort_unstable();
    assert_eq!(response.result, Output::Vector(sorted));

    let response = run(r#"{"algorithm": "tournament_crew", "a": {"random": 4}}"#).unwrap();
    assert!(matches!(response.result, Output::Vector(ref v) if v.len() == 4));
}

#[test]
fn invalid_shapes_are_rejected_with_a_reason() {
    let cases = [
        r#"{"algorithm": "hypercube_sum", "a": [1, 2, 3]}"#,
        r#"{"algorithm": "pram_sum_optimal", "a": [1, 2, 3, 4, 5, 6, 7, 8]}"#,
        r#"{"algorithm": "pram_replicate", "datum": 1, "ncopies": 6}"#,
        r#"{"algorithm": "pram_replicate", "datum": 1, "ncopies": 4611686018427387904}"#,
        r#"{"algorithm": "tournament_crew", "a": [1, 1, 2, 3]}"#,
        r#"{"algorithm": "butterfly_sum", "k": 2, "a": [1, 2, 3]}"#,
        r#"{"algorithm": "mesh_sum", "a": [1, 2, 3]}"#,
        r#"{"algorithm": "hypercube_matrix", "a": [[1, 2, 3]], "b": [[1]]}"#,
    ];
    for json in cases {
        match run(json) {
            Err(BspError::PreconditionViolation(reason)) => assert!(!reason.is_empty()),
            other => panic!("{json} gave {other:?}"),
        }
    }
}

#[test]
fn overflowing_inputs_fail_cleanly() {
    let huge = i64::MAX;
    let requests = [
        Request::PramSum { a: vec![huge, 1] },
        Request::PramSumOptimal {
            a: vec![huge, huge, 0, 0],
        },
        Request::HypercubeSum {
            a: vec![huge, 1],
            propagate: true,
        },
        Request::ShuffleSum { a: vec![huge, 1] },
        Request::MeshSum {
            a: vec![huge, 0, 1, 0],
            propagate: false,
        },
        Request::ButterflySum {
            k: 1,
            a: vec![huge, 1, 0, 0],
            propagate: false,
        },
        Request::MeshMatrix {
            a: vec![vec![huge]],
            b: vec![vec![2]],
        },
        Request::HypercubeMatrix {
            a: vec![vec![huge]],
            b: vec![vec![2]],
        },
    ];
    for request in requests {
        assert!(
            matches!(execute(&request), Err(BspError::Overflow { .. })),
            "{} did not report overflow",
            request.name()
        );
    }
}

#[test]
fn unknown_algorithms_do_not_parse() {
    assert!(serde_json::from_str::<Request>(r#"{"algorithm": "quick_sort", "a": []}"#).is_err());
}
