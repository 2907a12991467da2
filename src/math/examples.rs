pub struct FormulaExample {
    pub name: &'static str,
    pub description: &'static str,
    pub formula: &'static str,
}

pub const FORMULA_EXAMPLES: &[FormulaExample] = &[
    FormulaExample {
        name: "Egg Crate",
        description: "sin(x)·cos(z)",
        formula: "sin(x) * cos(z)",
    },
    FormulaExample {
        name: "Sine Wave",
        description: "Basic sine wave",
        formula: "sin(x) + sin(z)",
    },
    FormulaExample {
        name: "Ripple",
        description: "Radial wave pattern",
        formula: "3 * sin(2 * sqrt(x^2 + z^2)) / (sqrt(x^2 + z^2) + 1)",
    },
    FormulaExample {
        name: "Saddle",
        description: "Hyperbolic paraboloid",
        formula: "(x^2 - z^2) / 5",
    },
    FormulaExample {
        name: "Peaks",
        description: "Multiple gaussian bumps",
        formula: "3(1-x)^2 exp(-x^2 - (z+1)^2) - 10(x/5 - x^3 - z^5) exp(-x^2 - z^2) - exp(-(x+1)^2 - z^2) / 3",
    },
    FormulaExample {
        name: "Bowl",
        description: "Paraboloid",
        formula: "(x^2 + z^2) / 10 - 2",
    },
    FormulaExample {
        name: "Gaussian",
        description: "Single bell",
        formula: "4 exp(-(x^2 + z^2) / 4)",
    },
    FormulaExample {
        name: "Interference",
        description: "Two crossing waves",
        formula: "cos(x + z) + cos(x - z)",
    },
];

pub fn find_example(formula: &str) -> Option<usize> {
    FORMULA_EXAMPLES.iter().position(|ex| ex.formula == formula)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::expr::compile;

    #[test]
    fn test_every_example_compiles_and_evaluates() {
        for example in FORMULA_EXAMPLES {
            let expr = compile(example.formula)
                .unwrap_or_else(|e| panic!("{} failed to compile: {e}", example.name));
            assert!(
                expr.evaluate(0.5, -0.5).is_ok(),
                "{} is not finite at the sample point",
                example.name
            );
        }
    }

    #[test]
    fn test_default_formula_is_first_example() {
        assert_eq!(find_example("sin(x) * cos(z)"), Some(0));
        assert_eq!(find_example("x"), None);
    }
}
