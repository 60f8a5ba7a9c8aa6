use std::fmt;

/// A structural problem found while turning a parsed document into a [`super::Contract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractIssue {
    pub location: String,
    pub kind: String,
    pub message: String,
}

impl ContractIssue {
    pub fn new(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ContractIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ContractIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

/// Every issue collected during a contract build, reported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractIssues(pub Vec<ContractIssue>);

impl ContractIssues {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContractIssue> {
        self.0.iter()
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ContractIssues> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ContractIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OpenAPI contract is invalid, {} issue(s) found:", self.0.len())?;
        for issue in &self.0 {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for ContractIssues {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_display() {
        let issue = ContractIssue::new("GET /pets/{id}", "MissingPathParameter", "no parameter named 'id'");
        assert_eq!(
            issue.to_string(),
            "[MissingPathParameter] GET /pets/{id}: no parameter named 'id'"
        );
    }

    #[test]
    fn test_empty_issues_are_ok() {
        assert!(ContractIssues(Vec::new()).into_result().is_ok());
        let err = ContractIssues(vec![ContractIssue::new("servers[0]", "InvalidServerUrl", "bad")])
            .into_result()
            .unwrap_err();
        assert!(err.to_string().contains("1 issue(s) found"));
    }
}
