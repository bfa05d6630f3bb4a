//! Server Island scenarios: classification, validation and extraction
//! working together on realistic page sources.

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::extract::extract_static_html;
    use crate::validate::{classify, validate, IslandViolation};

    const PRICING: &str = r#"
export const render = "server";

export default function Pricing() {
  return (
    <div className="pricing" style={{maxWidth: "960px", margin: "0 auto"}}>
      {/* plans are static for now */}
      <h1>{"Pricing"}</h1>
      <p>Starting at ${9} per month.</p>
      <Divider />
      <a href="/signup">Sign up</a>
      <hr />
    </div>
  );
}
"#;

    #[test]
    fn test_valid_island_end_to_end() {
        assert!(classify(PRICING));
        assert!(validate(PRICING).is_empty());
        assert_eq!(
            extract_static_html(PRICING).unwrap(),
            r#"<div class="pricing" style="max-width: 960px; margin: 0 auto"> <h1>Pricing</h1> <p>Starting at $9 per month.</p> <Divider></Divider> <a href="/signup">Sign up</a> <hr /> </div>"#
        );
    }

    #[test]
    fn test_state_hook_violation() {
        let src = r#"
export const render = "server";
export default function Counter() {
  const [count, setCount] = useState(0);
  return (<p>{count}</p>);
}
"#;
        assert_eq!(validate(src), vec![IslandViolation::Hook("useState".into())]);
    }

    #[test]
    fn test_event_handler_violation() {
        let src = r#"
export const render = "server";
export default function Button() {
  return (<button onClick={() => alert("hi")}>Click</button>);
}
"#;
        assert_eq!(
            validate(src),
            vec![IslandViolation::EventHandler("onClick".into())]
        );
    }

    #[test]
    fn test_both_violations_in_one_call() {
        let src = r#"
export const render = "server";
export default function Both() {
  const [open, setOpen] = useState(false);
  return (<button onClick={() => setOpen(!open)}>Toggle</button>);
}
"#;
        let messages: Vec<String> = validate(src).iter().map(ToString::to_string).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("useState"));
        assert!(messages[1].contains("onClick"));
    }

    #[test]
    fn test_non_island_is_not_validated_by_classify() {
        let src = "export default function Home() { const [a] = useState(1); return (<p/>); }";
        assert!(!classify(src));
    }
}
