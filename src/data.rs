use dialoguer::Completion;

/// Role name to system prompt, in the order roles are offered to users.
pub struct RoleTable {
    roles: Vec<(String, String)>,
}

impl Default for RoleTable {
    fn default() -> Self {
        RoleTable {
            roles: vec![
                (
                    "Frontend Developer".to_string(),
                    "You are an expert Frontend Developer proficient in React, Vue, CSS, and modern web design principles. Answer questions focusing on UI/UX, responsiveness, and frontend frameworks.".to_string(),
                ),
                (
                    "Backend Developer".to_string(),
                    "You are an expert Backend Developer skilled in Python, Node.js, databases, and API design. Focus your answers on server-side logic, data structures, and system architecture.".to_string(),
                ),
                (
                    "Infra Manager".to_string(),
                    "You are a DevOps and Infrastructure Manager expert in Docker, Kubernetes, CI/CD, and cloud platforms. Provide advice on deployment, scalability, and system reliability.".to_string(),
                ),
                (
                    "HR".to_string(),
                    "You are a Human Resources representative. You are professional, empathetic, and knowledgeable about company policies, conflict resolution, and employee well-being.".to_string(),
                ),
            ],
        }
    }
}

impl RoleTable {
    /// Exact, case-sensitive lookup.
    pub fn prompt_for(&self, role: &str) -> Option<&str> {
        self.roles
            .iter()
            .find(|(name, _)| name == role)
            .map(|(_, prompt)| prompt.as_str())
    }

    pub fn names(&self) -> Vec<String> {
        self.roles.iter().map(|(name, _)| name.clone()).collect()
    }
}

pub struct CommandCompletion {
    options: Vec<String>,
}

impl Default for CommandCompletion {
    fn default() -> Self {
        CommandCompletion {
            options: vec![
                "/exit".to_string(),
                "/clear".to_string(),
                "/role".to_string(),
                "/history".to_string(),
                "/copy".to_string(),
                "/copy_all".to_string(),
                "/code".to_string(),
            ],
        }
    }
}

impl Completion for CommandCompletion {
    /// Completes only when the prefix is unambiguous
    fn get(&self, input: &str) -> Option<String> {
        let matches = self
            .options
            .iter()
            .filter(|option| option.starts_with(input))
            .collect::<Vec<_>>();

        if matches.len() == 1 {
            Some(matches[0].to_string())
        } else {
            None
        }
    }
}
