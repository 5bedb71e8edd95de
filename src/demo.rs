use crate::models::Job;

fn job(
    id: &str,
    title: &str,
    company: &str,
    location: &str,
    salary: &str,
    job_type: &str,
    description: &str,
) -> Job {
    Job {
        id: id.to_string(),
        title: title.to_string(),
        company: Some(company.to_string()),
        location: Some(location.to_string()),
        salary: Some(salary.to_string()),
        job_type: Some(job_type.to_string()),
        description: Some(description.to_string()),
        apply_link: None,
        created_at: Some("2024-01-15T09:00:00Z".to_string()),
        updated_at: None,
    }
}

/// Seed listings shown alongside the external feed.
pub fn internal_jobs() -> Vec<Job> {
    vec![
        job(
            "1",
            "Frontend Developer",
            "Brightline Labs",
            "Remote",
            "$90k - $120k",
            "FT",
            "Build and ship React interfaces for our hiring products.",
        ),
        job(
            "2",
            "Backend Engineer",
            "Northwind Systems",
            "Austin, TX",
            "$110k - $140k",
            "FT",
            "Own REST services, MySQL schemas and background jobs.",
        ),
        job(
            "3",
            "UI/UX Designer",
            "Pixel Forge",
            "New York, NY",
            "$80k - $100k",
            "CT",
            "Design flows for job seekers and recruiters.",
        ),
        job(
            "4",
            "DevOps Engineer",
            "Cloudward",
            "Remote",
            "$120k - $150k",
            "FT",
            "Run CI/CD pipelines and container infrastructure.",
        ),
        job(
            "5",
            "Data Analyst Intern",
            "Metricly",
            "Chicago, IL",
            "$25/hr",
            "IN",
            "Support the analytics team with reporting and dashboards.",
        ),
        job(
            "6",
            "Technical Writer",
            "DocuSpring",
            "Remote",
            "$60k - $75k",
            "PT",
            "Write developer guides and API reference material.",
        ),
    ]
}
