pub struct TemplateVariables<'a> {
    context: &'a str,
    question: &'a str,
}

impl<'a> TemplateVariables<'a> {
    pub fn new(context: &'a str, question: &'a str) -> Self {
        Self { context, question }
    }

    fn lookup(&self, name: &str) -> Option<&'a str> {
        match name {
            "context" => Some(self.context),
            "question" => Some(self.question),
            _ => None,
        }
    }

    /// Substitutes `{context}` and `{question}` in a single left to right pass.
    /// Substituted text is never rescanned, so braces coming from documents or
    /// from the user end up in the prompt verbatim.
    pub fn substitute_template(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len() + self.context.len() + self.question.len());
        let mut rest = s;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];

            let replaced = tail
                .find('}')
                .and_then(|close| Some((self.lookup(&tail[1..close])?, close)));

            match replaced {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }

        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_known_placeholders() {
        let vars = TemplateVariables::new("ctx", "why?");
        assert_eq!(
            vars.substitute_template("A {context} B {question} C {context}"),
            "A ctx B why? C ctx"
        );
    }

    #[test]
    fn leaves_unknown_and_unbalanced_braces() {
        let vars = TemplateVariables::new("ctx", "q");
        assert_eq!(
            vars.substitute_template("{name} {question"),
            "{name} {question"
        );
        assert_eq!(vars.substitute_template("}{}{question}"), "}{}q");
    }

    #[test]
    fn does_not_expand_placeholders_inside_values() {
        let vars = TemplateVariables::new("docs mention {question}", "what is {context}?");
        assert_eq!(
            vars.substitute_template("{context} | {question}"),
            "docs mention {question} | what is {context}?"
        );
    }
}
