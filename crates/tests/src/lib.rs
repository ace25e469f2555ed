
#[cfg(test)]
mod admin_tests;
#[cfg(test)]
mod complaint_lifecycle_tests;
#[cfg(test)]
mod evidence_tests;
#[cfg(test)]
mod pdf_tests;
#[cfg(test)]
mod user_tests;
